//! Adapters for the external analysis backend.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use crate::domain::errors::BackendError;
use crate::domain::model::{FocusOutput, Spans};
use crate::domain::range::Interval;
use crate::infra::config::BackendConfig;

/// Backend subcommands the focus engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subcommand {
    /// List every analyzable body in a file.
    Spans,
    /// Analyze the body enclosing an offset.
    Focus,
}

impl Subcommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spans => "spans",
            Self::Focus => "focus",
        }
    }
}

impl fmt::Display for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend invocation: a subcommand, the file it targets and offset arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub subcommand: Subcommand,
    pub file: String,
    pub args: Vec<usize>,
}

impl BackendRequest {
    pub fn spans(file: impl Into<String>) -> Self {
        Self {
            subcommand: Subcommand::Spans,
            file: file.into(),
            args: Vec::new(),
        }
    }

    pub fn focus(file: impl Into<String>, offset: usize) -> Self {
        Self {
            subcommand: Subcommand::Focus,
            file: file.into(),
            args: vec![offset],
        }
    }
}

/// Opaque analysis backend. Implementations return the subcommand-specific JSON payload.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn invoke(&self, request: &BackendRequest) -> Result<Value, BackendError>;
}

/// List the body spans of `file`.
pub async fn spans<B: Backend + ?Sized>(backend: &B, file: &str) -> Result<Spans, BackendError> {
    call(backend, &BackendRequest::spans(file)).await
}

/// Analyze the body enclosing `offset` in `file`.
pub async fn focus<B: Backend + ?Sized>(
    backend: &B,
    file: &str,
    offset: usize,
) -> Result<FocusOutput, BackendError> {
    call(backend, &BackendRequest::focus(file, offset)).await
}

async fn call<B, T>(backend: &B, request: &BackendRequest) -> Result<T, BackendError>
where
    B: Backend + ?Sized,
    T: DeserializeOwned,
{
    tracing::debug!(
        subcommand = %request.subcommand,
        file = %request.file,
        args = ?request.args,
        "invoking backend"
    );
    let payload = backend.invoke(request).await.inspect_err(|err| {
        tracing::warn!(subcommand = %request.subcommand, error = %err, "backend call failed");
    })?;
    serde_json::from_value(payload).map_err(|err| {
        BackendError::analysis(format!(
            "unexpected {} payload: {err}",
            request.subcommand
        ))
    })
}

/// Response envelope written by the backend: `{"Ok": payload}` or `{"Err": error}`.
#[derive(Debug, Deserialize)]
enum Envelope {
    Ok(Value),
    Err(BackendError),
}

/// Decode raw backend stdout into its payload.
///
/// Stdout carries the envelope as gzip-compressed JSON, base64 encoded. Any decoding failure
/// is an analysis error.
pub fn decode_response(bytes: &[u8]) -> Result<Value, BackendError> {
    let compressed = STANDARD.decode(bytes.trim_ascii()).map_err(malformed)?;
    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(malformed)?;
    let envelope: Envelope = serde_json::from_slice(&json).map_err(malformed)?;
    match envelope {
        Envelope::Ok(value) => Ok(value),
        Envelope::Err(err) => Err(err),
    }
}

fn malformed(err: impl fmt::Display) -> BackendError {
    BackendError::analysis(format!("malformed backend output: {err}"))
}

/// Runs the backend as an external command:
/// `<command> <args..> <subcommand> <file> <offsets..>`.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            program: config.command(),
            args: config.args(),
            working_dir: config.working_dir.clone(),
        }
    }

    fn command_for(&self, request: &BackendRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(request.subcommand.as_str())
            .arg(&request.file)
            .args(request.args.iter().map(usize::to_string))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Backend for CommandBackend {
    async fn invoke(&self, request: &BackendRequest) -> Result<Value, BackendError> {
        let output = self
            .command_for(request)
            .output()
            .await
            .map_err(|err| BackendError::build(format!("failed to run {}: {err}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            tracing::debug!(status = %output.status, "backend exited unsuccessfully");
            return Err(BackendError::build(stderr));
        }

        decode_response(&output.stdout)
    }
}

/// Recorded backend responses for offline sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFixture {
    /// `spans` payload per file.
    #[serde(default)]
    pub spans: HashMap<String, Spans>,
    /// `focus` payloads; the one whose body range encloses the requested offset answers.
    #[serde(default)]
    pub focus: Vec<FocusOutput>,
    /// Files whose analysis fails with a build error.
    #[serde(default)]
    pub build_errors: HashMap<String, String>,
}

/// Backend answering from a [`ReplayFixture`] and counting calls per subcommand.
#[derive(Debug, Default)]
pub struct ReplayBackend {
    fixture: ReplayFixture,
    spans_calls: AtomicUsize,
    focus_calls: AtomicUsize,
}

impl ReplayBackend {
    pub fn new(fixture: ReplayFixture) -> Self {
        Self {
            fixture,
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read replay fixture {}", path.display()))?;
        let fixture = serde_json::from_str(&data)
            .with_context(|| format!("invalid replay fixture {}", path.display()))?;
        Ok(Self::new(fixture))
    }

    pub fn calls(&self, subcommand: Subcommand) -> usize {
        self.counter(subcommand).load(Ordering::SeqCst)
    }

    fn counter(&self, subcommand: Subcommand) -> &AtomicUsize {
        match subcommand {
            Subcommand::Spans => &self.spans_calls,
            Subcommand::Focus => &self.focus_calls,
        }
    }

    fn answer(&self, request: &BackendRequest) -> Result<Value, BackendError> {
        if let Some(message) = self.fixture.build_errors.get(&request.file) {
            return Err(BackendError::build(message.clone()));
        }

        let payload = match request.subcommand {
            Subcommand::Spans => self
                .fixture
                .spans
                .get(&request.file)
                .map(serde_json::to_value),
            Subcommand::Focus => {
                let offset = request.args.first().copied().unwrap_or_default();
                self.fixture
                    .focus
                    .iter()
                    .filter(|focus| focus.body_range.filename == request.file)
                    .find(|focus| focus.body_range.interval().intersects(&Interval::point(offset)))
                    .map(serde_json::to_value)
            }
        };

        match payload {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(BackendError::analysis(err.to_string())),
            None => Err(BackendError::analysis(format!(
                "no recorded {} response for {} {:?}",
                request.subcommand, request.file, request.args
            ))),
        }
    }
}

#[async_trait]
impl Backend for ReplayBackend {
    async fn invoke(&self, request: &BackendRequest) -> Result<Value, BackendError> {
        self.counter(request.subcommand).fetch_add(1, Ordering::SeqCst);
        // Recorded answers still suspend, like a real backend call would.
        tokio::task::yield_now().await;
        self.answer(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PlaceInfo;
    use crate::domain::range::Range;

    fn r(start: usize, end: usize) -> Range {
        Range::try_new(start, end, "src/lib.rs").unwrap()
    }

    fn fixture() -> ReplayFixture {
        let mut fixture = ReplayFixture::default();
        fixture.spans.insert(
            "src/lib.rs".into(),
            Spans {
                spans: vec![r(0, 100), r(120, 200)],
            },
        );
        fixture.focus.push(FocusOutput {
            place_info: vec![PlaceInfo {
                range: r(40, 50),
                slice: vec![r(10, 20)],
                mutations: Vec::new(),
            }],
            body_range: r(0, 100),
            arg_range: None,
        });
        fixture
    }

    /// Encode `json` the way the backend writes it to stdout.
    fn encoded(json: &str) -> Vec<u8> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        let mut out = STANDARD.encode(encoder.finish().unwrap()).into_bytes();
        out.push(b'\n');
        out
    }

    #[test]
    fn decodes_ok_envelope() {
        let value = decode_response(&encoded(r#"{"Ok": {"spans": []}}"#)).unwrap();
        assert_eq!(value, serde_json::json!({"spans": []}));
    }

    #[test]
    fn decodes_err_envelope() {
        let err = decode_response(&encoded(
            r#"{"Err": {"type": "BuildError", "error": "E0425"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err, BackendError::build("E0425"));
    }

    #[test]
    fn malformed_output_is_analysis_error() {
        for output in [
            b"thread 'main' panicked".to_vec(),
            br#"{"Ok": {"spans": []}}"#.to_vec(),
            STANDARD.encode("not gzip").into_bytes(),
            encoded("{ truncated"),
        ] {
            let err = decode_response(&output).unwrap_err();
            assert!(!err.is_build());
            assert!(err.message().contains("malformed backend output"));
        }
    }

    #[tokio::test]
    async fn replay_answers_focus_by_offset() {
        let backend = ReplayBackend::new(fixture());

        let focus = focus(&backend, "src/lib.rs", 42).await.unwrap();
        assert_eq!(focus.body_range, r(0, 100));

        let missing = super::focus(&backend, "src/lib.rs", 150).await.unwrap_err();
        assert!(missing.message().contains("no recorded focus response"));
        assert_eq!(backend.calls(Subcommand::Focus), 2);
        assert_eq!(backend.calls(Subcommand::Spans), 0);
    }

    #[tokio::test]
    async fn payload_shape_mismatch_is_analysis_error() {
        let mut fixture = fixture();
        fixture.focus.clear();
        let backend = ReplayBackend::new(fixture);
        let spans = spans(&backend, "src/lib.rs").await.unwrap();
        assert_eq!(spans.spans.len(), 2);

        struct Garbage;
        #[async_trait]
        impl Backend for Garbage {
            async fn invoke(&self, _request: &BackendRequest) -> Result<Value, BackendError> {
                Ok(serde_json::json!({"unexpected": true}))
            }
        }
        let err = super::spans(&Garbage, "src/lib.rs").await.unwrap_err();
        assert!(err.message().starts_with("unexpected spans payload"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_backend_passes_request_as_arguments() {
        let backend = CommandBackend::new(
            "sh",
            vec![
                "-c".into(),
                r#"printf '{"Ok": {"spans": [{"start": %s, "end": 9, "filename": "%s"}]}}' "$3" "$2" | gzip -c | base64 | tr -d '\n'"#
                    .into(),
                "sh".into(),
            ],
        );
        let value = backend
            .invoke(&BackendRequest::focus("a.rs", 4))
            .await
            .unwrap();
        let spans: Spans = serde_json::from_value(value).unwrap();
        assert_eq!(spans.spans, vec![Range::try_new(4, 9, "a.rs").unwrap()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_is_build_error() {
        let backend = CommandBackend::new(
            "sh",
            vec!["-c".into(), "echo 'error[E0308]: mismatched types' >&2; exit 101".into()],
        );
        let err = backend
            .invoke(&BackendRequest::spans("a.rs"))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::build("error[E0308]: mismatched types"));
    }
}
