//! Configuration management utilities.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".slicefocus/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub focus: Focus,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Focus {
    /// File extensions focus mode reacts to.
    #[serde(default = "Focus::default_file_extensions")]
    pub file_extensions: Vec<String>,
    /// How long a backend call may run before progress feedback is shown.
    #[serde(default = "Focus::default_progress_delay_ms")]
    pub progress_delay_ms: u64,
}

impl Focus {
    fn default_file_extensions() -> Vec<String> {
        vec!["rs".into()]
    }

    fn default_progress_delay_ms() -> u64 {
        5_000
    }

    pub fn progress_delay(&self) -> Duration {
        Duration::from_millis(self.progress_delay_ms)
    }

    /// Whether `filename` has one of the configured extensions.
    pub fn tracks(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.file_extensions
                    .iter()
                    .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }
}

impl Default for Focus {
    fn default() -> Self {
        Self {
            file_extensions: Self::default_file_extensions(),
            progress_delay_ms: Self::default_progress_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Option<Vec<String>>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl BackendConfig {
    fn default_command() -> &'static str {
        "cargo"
    }

    fn default_args() -> Vec<String> {
        vec!["flowistry".into()]
    }

    pub fn command(&self) -> String {
        self.command
            .clone()
            .unwrap_or_else(|| Self::default_command().to_owned())
    }

    pub fn args(&self) -> Vec<String> {
        self.args.clone().unwrap_or_else(Self::default_args)
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    backend_command: Option<String>,
    progress_delay_ms: Option<u64>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            backend_command: env::var("SLICEFOCUS_BACKEND_COMMAND").ok(),
            progress_delay_ms: env::var("SLICEFOCUS_PROGRESS_DELAY_MS")
                .ok()
                .and_then(|value| value.parse().ok()),
        }
    }

    #[cfg(test)]
    fn for_tests(command: &str, delay: u64) -> Self {
        Self {
            backend_command: Some(command.to_owned()),
            progress_delay_ms: Some(delay),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    /// Like [`Config::load`], with an explicit file layered on top of the workspace config.
    pub fn load_with_override(path: &Path) -> Result<Self> {
        let base = Self::load()?;
        let overlay = Self::from_file(path)?;
        Ok(apply_env_overrides(
            base.merge(overlay),
            EnvOverrides::from_env(),
        ))
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            focus: merge_focus(self.focus, other.focus),
            backend: merge_backend(self.backend, other.backend),
        }
    }
}

fn merge_focus(base: Focus, overlay: Focus) -> Focus {
    let mut extensions: BTreeSet<String> = base.file_extensions.into_iter().collect();
    extensions.extend(overlay.file_extensions);

    Focus {
        file_extensions: extensions.into_iter().collect(),
        progress_delay_ms: if overlay.progress_delay_ms != Focus::default_progress_delay_ms() {
            overlay.progress_delay_ms
        } else {
            base.progress_delay_ms
        },
    }
}

fn merge_backend(mut base: BackendConfig, overlay: BackendConfig) -> BackendConfig {
    if let Some(command) = overlay.command {
        base.command = Some(command);
    }
    if let Some(args) = overlay.args {
        base.args = Some(args);
    }
    if let Some(dir) = overlay.working_dir {
        base.working_dir = Some(dir);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("slicefocus/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_workspace_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

/// Nearest ancestor of `start` holding a `Cargo.toml`.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("Cargo.toml").exists())
        .map(Path::to_path_buf)
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(command) = env.backend_command {
        config.backend.command = Some(command);
    }
    if let Some(delay) = env.progress_delay_ms {
        config.focus.progress_delay_ms = delay;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.backend.command(), "cargo");
        assert_eq!(config.focus.file_extensions, vec!["rs".to_string()]);
        assert_eq!(config.focus.progress_delay(), Duration::from_secs(5));
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[backend]
command = "flowistry-driver"
[focus]
file_extensions = ["rsx"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".slicefocus"))?;
        fs::write(
            workspace_dir.join(".slicefocus/config.toml"),
            r#"
[backend]
args = ["+nightly", "flowistry"]
working_dir = "crates/core"
[focus]
progress_delay_ms = 250
"#,
        )?;

        let config = Config::load_with_layers(
            Some(global),
            Some(workspace_dir.join(".slicefocus/config.toml")),
            EnvOverrides::default(),
        )?;

        assert_eq!(config.backend.command(), "flowistry-driver");
        assert_eq!(config.backend.args(), vec!["+nightly", "flowistry"]);
        assert_eq!(
            config.backend.working_dir.as_deref(),
            Some(Path::new("crates/core"))
        );
        assert_eq!(config.focus.progress_delay_ms, 250);
        assert!(config.focus.file_extensions.contains(&"rs".into()));
        assert!(config.focus.file_extensions.contains(&"rsx".into()));

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("/opt/bin/analyzer", 10);
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.backend.command(), "/opt/bin/analyzer");
        assert_eq!(config.focus.progress_delay_ms, 10);
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn tracks_configured_extensions_only() {
        let focus = Focus::default();
        assert!(focus.tracks("src/main.rs"));
        assert!(focus.tracks("src/MAIN.RS"));
        assert!(!focus.tracks("Cargo.toml"));
        assert!(!focus.tracks("README"));
    }

    #[test]
    fn finds_nearest_cargo_manifest() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let nested = temp.path().join("crates/core/src");
        fs::create_dir_all(&nested)?;
        fs::write(temp.path().join("crates/core/Cargo.toml"), "[package]\n")?;

        assert_eq!(
            find_workspace_root(&nested),
            Some(temp.path().join("crates/core"))
        );
        Ok(())
    }
}
