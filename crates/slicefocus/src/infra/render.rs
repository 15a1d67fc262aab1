//! Editor-facing surfaces: range highlighting and user feedback.
//!
//! The focus engine only speaks in byte ranges; converting them to lines and columns is
//! left to the renderer implementation.

use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::model::FocusMode;
use crate::domain::range::Range;

/// Highlight styles applied by focus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    /// The places the slice was computed from.
    Selected,
    /// Everything outside the slice.
    Dimmed,
}

impl Highlight {
    pub const ALL: [Highlight; 2] = [Highlight::Selected, Highlight::Dimmed];
}

/// Draws ranges into an editor.
pub trait Renderer: Send + Sync {
    fn set_highlight(&self, style: Highlight, ranges: &[Range]);
    fn clear_highlight(&self, style: Highlight);
    fn set_selections(&self, ranges: &[Range]);
    fn reveal_range(&self, range: &Range);

    fn clear_all(&self) {
        for style in Highlight::ALL {
            self.clear_highlight(style);
        }
    }
}

/// Surfaces mode changes and errors to the user.
pub trait Reporter: Send + Sync {
    fn set_status(&self, mode: FocusMode);
    /// Persistent pane for build failures.
    fn show_build_error(&self, message: &str);
    fn hide_build_error(&self);
    /// Dismissible notification for per-query failures.
    fn notify_error(&self, message: &str);
    fn show_progress(&self, title: &str);
    fn hide_progress(&self);
}

/// A single renderer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderCommand {
    SetHighlight { style: Highlight, ranges: Vec<Range> },
    ClearHighlight { style: Highlight },
    SetSelections { ranges: Vec<Range> },
    RevealRange { range: Range },
}

/// Renderer that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    commands: Mutex<Vec<RenderCommand>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<RenderCommand> {
        self.commands.lock().clone()
    }

    pub fn take(&self) -> Vec<RenderCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    /// Ranges most recently set for `style`, or `None` if it was cleared afterwards or never set.
    pub fn highlighted(&self, style: Highlight) -> Option<Vec<Range>> {
        self.commands
            .lock()
            .iter()
            .rev()
            .find_map(|command| match command {
                RenderCommand::SetHighlight { style: s, ranges } if *s == style => {
                    Some(Some(ranges.clone()))
                }
                RenderCommand::ClearHighlight { style: s } if *s == style => Some(None),
                _ => None,
            })
            .flatten()
    }

    fn push(&self, command: RenderCommand) {
        self.commands.lock().push(command);
    }
}

impl Renderer for RecordingRenderer {
    fn set_highlight(&self, style: Highlight, ranges: &[Range]) {
        self.push(RenderCommand::SetHighlight {
            style,
            ranges: ranges.to_vec(),
        });
    }

    fn clear_highlight(&self, style: Highlight) {
        self.push(RenderCommand::ClearHighlight { style });
    }

    fn set_selections(&self, ranges: &[Range]) {
        self.push(RenderCommand::SetSelections {
            ranges: ranges.to_vec(),
        });
    }

    fn reveal_range(&self, range: &Range) {
        self.push(RenderCommand::RevealRange {
            range: range.clone(),
        });
    }
}

/// A single reporter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    Status { mode: FocusMode },
    BuildError { message: String },
    BuildErrorHidden,
    Notification { message: String },
    Progress { title: String },
    ProgressHidden,
}

/// Reporter that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    /// Whether the build error pane is open after the recorded calls.
    pub fn build_error_visible(&self) -> bool {
        self.events
            .lock()
            .iter()
            .rev()
            .find_map(|event| match event {
                ReportEvent::BuildError { .. } => Some(true),
                ReportEvent::BuildErrorHidden => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn push(&self, event: ReportEvent) {
        self.events.lock().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn set_status(&self, mode: FocusMode) {
        self.push(ReportEvent::Status { mode });
    }

    fn show_build_error(&self, message: &str) {
        self.push(ReportEvent::BuildError {
            message: message.to_owned(),
        });
    }

    fn hide_build_error(&self) {
        self.push(ReportEvent::BuildErrorHidden);
    }

    fn notify_error(&self, message: &str) {
        self.push(ReportEvent::Notification {
            message: message.to_owned(),
        });
    }

    fn show_progress(&self, title: &str) {
        self.push(ReportEvent::Progress {
            title: title.to_owned(),
        });
    }

    fn hide_progress(&self) {
        self.push(ReportEvent::ProgressHidden);
    }
}

/// Reporter writing everything to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn set_status(&self, mode: FocusMode) {
        let indicator = mode.indicator();
        tracing::info!(
            ?mode,
            icon = indicator.icon.unwrap_or("none"),
            command = indicator.command,
            "focus mode"
        );
    }

    fn show_build_error(&self, message: &str) {
        tracing::error!(%message, "project failed to build");
    }

    fn hide_build_error(&self) {}

    fn notify_error(&self, message: &str) {
        tracing::warn!(%message, "analysis error");
    }

    fn show_progress(&self, title: &str) {
        tracing::info!(%title, "in progress");
    }

    fn hide_progress(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: usize, end: usize) -> Range {
        Range::try_new(start, end, "lib.rs").unwrap()
    }

    #[test]
    fn tracks_latest_highlight_per_style() {
        let renderer = RecordingRenderer::new();
        renderer.set_highlight(Highlight::Selected, &[r(1, 2)]);
        renderer.set_highlight(Highlight::Dimmed, &[r(0, 1)]);
        assert_eq!(renderer.highlighted(Highlight::Selected), Some(vec![r(1, 2)]));

        renderer.clear_all();
        assert_eq!(renderer.highlighted(Highlight::Selected), None);
        assert_eq!(renderer.highlighted(Highlight::Dimmed), None);
        assert_eq!(renderer.take().len(), 4);
        assert!(renderer.commands().is_empty());
    }

    #[test]
    fn render_commands_serialize_with_op_tag() {
        let json = serde_json::to_value(RenderCommand::ClearHighlight {
            style: Highlight::Dimmed,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"op": "clear_highlight", "style": "dimmed"}));
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn tracing_reporter_logs_status_indicator() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingReporter.set_status(FocusMode::Loading);
            TracingReporter.set_status(FocusMode::Error);
        });

        let logged = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert!(logged.contains("sync~spin"));
        assert!(logged.contains("last_error"));
    }

    #[test]
    fn build_error_pane_visibility() {
        let reporter = RecordingReporter::new();
        assert!(!reporter.build_error_visible());
        reporter.show_build_error("E0382");
        reporter.set_status(FocusMode::Error);
        assert!(reporter.build_error_visible());
        reporter.hide_build_error();
        assert!(!reporter.build_error_visible());
    }
}
