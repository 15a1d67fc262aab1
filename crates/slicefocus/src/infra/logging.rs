//! Tracing subscriber setup.

use std::env;

use tracing::Level;

const LOG_ENV: &str = "SLICEFOCUS_LOG";

/// Install the fmt subscriber on stderr. Stdout is reserved for command output.
///
/// The level comes from `SLICEFOCUS_LOG` (`error`..`trace`) and defaults to `warn`. Calling
/// this more than once is harmless.
pub fn init() {
    let level = level_from(env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn level_from(value: Option<&str>) -> Level {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(Level::WARN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!(level_from(Some("DEBUG")), Level::DEBUG);
        assert_eq!(level_from(Some(" trace ")), Level::TRACE);
        assert_eq!(level_from(Some("loud")), Level::WARN);
        assert_eq!(level_from(None), Level::WARN);
    }
}
