//! Focus mode state machine wiring editor events to per-document focus state.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use crate::app::document::DocumentFocusState;
use crate::domain::errors::BackendError;
use crate::domain::model::{EditorSnapshot, FocusMode};
use crate::domain::range::Selection;
use crate::infra::backend::Backend;
use crate::infra::config::Focus;
use crate::infra::render::{Renderer, Reporter};

const PROGRESS_TITLE: &str = "Waiting for analysis...";

/// Editor notifications the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The active editor changed (or closed).
    ActiveEditorChanged(Option<EditorSnapshot>),
    SelectionChanged { filename: String, selection: Selection },
    DocumentEdited { filename: String, dirty: bool },
    DocumentSaved { filename: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Subscription {
    Selection,
    Edit,
    Save,
}

impl EditorEvent {
    fn subscription(&self) -> Option<Subscription> {
        match self {
            Self::ActiveEditorChanged(_) => None,
            Self::SelectionChanged { .. } => Some(Subscription::Selection),
            Self::DocumentEdited { .. } => Some(Subscription::Edit),
            Self::DocumentSaved { .. } => Some(Subscription::Save),
        }
    }
}

/// User-facing focus commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusCommand {
    Toggle,
    Mark,
    Unmark,
    Select,
    LastError,
}

impl FromStr for FocusCommand {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim() {
            "focus" => Ok(Self::Toggle),
            "focus_mark" => Ok(Self::Mark),
            "focus_unmark" => Ok(Self::Unmark),
            "focus_select" => Ok(Self::Select),
            "last_error" => Ok(Self::LastError),
            other => Err(format!("unknown focus command: {other}")),
        }
    }
}

/// Session-wide focus mode controller. One instance per editor session.
pub struct FocusModeController {
    mode: FocusMode,
    documents: HashMap<String, Arc<DocumentFocusState>>,
    subscriptions: BTreeSet<Subscription>,
    editor: Option<EditorSnapshot>,
    last_error: Option<BackendError>,
    backend: Arc<dyn Backend>,
    renderer: Arc<dyn Renderer>,
    reporter: Arc<dyn Reporter>,
    settings: Focus,
}

impl FocusModeController {
    pub fn new(
        backend: Arc<dyn Backend>,
        renderer: Arc<dyn Renderer>,
        reporter: Arc<dyn Reporter>,
        settings: Focus,
    ) -> Self {
        Self {
            mode: FocusMode::Idle,
            documents: HashMap::new(),
            subscriptions: BTreeSet::new(),
            editor: None,
            last_error: None,
            backend,
            renderer,
            reporter,
            settings,
        }
    }

    pub fn mode(&self) -> FocusMode {
        self.mode
    }

    pub fn editor(&self) -> Option<&EditorSnapshot> {
        self.editor.as_ref()
    }

    /// Cached focus state for `filename`, if any.
    pub fn document(&self, filename: &str) -> Option<&Arc<DocumentFocusState>> {
        self.documents.get(filename)
    }

    pub fn last_error(&self) -> Option<&BackendError> {
        self.last_error.as_ref()
    }

    /// Run a named command.
    pub async fn execute(&mut self, command: FocusCommand) {
        match command {
            FocusCommand::Toggle => self.toggle().await,
            FocusCommand::Mark => self.mark().await,
            FocusCommand::Unmark => self.unmark().await,
            FocusCommand::Select => self.select().await,
            FocusCommand::LastError => self.show_last_error(),
        }
    }

    /// Switch focus mode on or off.
    pub async fn toggle(&mut self) {
        if self.mode == FocusMode::Idle {
            self.set_mode(FocusMode::Active);
            self.subscriptions = BTreeSet::from([
                Subscription::Selection,
                Subscription::Edit,
                Subscription::Save,
            ]);
            self.update_slice().await;
        } else {
            self.set_mode(FocusMode::Idle);
            self.renderer.clear_all();
            self.subscriptions.clear();
            self.drop_documents();
            self.reporter.hide_build_error();
        }
    }

    /// Dispatch an editor notification. Events without a live subscription are ignored.
    pub async fn handle(&mut self, event: EditorEvent) {
        if let Some(kind) = event.subscription()
            && !self.subscriptions.contains(&kind)
        {
            tracing::trace!(?event, "no subscription, ignoring");
            return;
        }

        match event {
            EditorEvent::ActiveEditorChanged(editor) => {
                self.editor = editor;
            }
            EditorEvent::SelectionChanged {
                filename,
                selection,
            } => {
                let Some(editor) = self.editor.as_mut().filter(|e| e.filename == filename) else {
                    tracing::trace!(file = %filename, "selection outside the active editor, ignoring");
                    return;
                };
                editor.selection = selection;
                self.update_slice().await;
            }
            EditorEvent::DocumentEdited { filename, dirty } => {
                self.on_edit(&filename, dirty);
            }
            EditorEvent::DocumentSaved { filename } => {
                self.on_save(&filename).await;
            }
        }
    }

    /// Pin the current selection so later slices are computed from it.
    pub async fn mark(&mut self) {
        let Some(selection) = self.prepare_command() else {
            return;
        };
        let result = match self.active_document().await {
            Ok(doc) => doc.set_mark(&*self.backend, selection).await,
            Err(err) => Err(err),
        };
        if self.settle(result) {
            self.update_slice().await;
        }
    }

    /// Drop the mark and follow the cursor again.
    pub async fn unmark(&mut self) {
        let Some(selection) = self.prepare_command() else {
            return;
        };
        let result = match self.active_document().await {
            Ok(doc) => doc.clear_mark(&*self.backend, selection).await,
            Err(err) => Err(err),
        };
        if self.settle(result) {
            self.update_slice().await;
        }
    }

    /// Replace the editor selections with the current slice.
    pub async fn select(&mut self) {
        let Some(selection) = self.prepare_command() else {
            return;
        };
        let result = match self.active_document().await {
            Ok(doc) => {
                doc.select(&*self.backend, &*self.renderer, selection)
                    .await
            }
            Err(err) => Err(err),
        };
        if self.settle(result) {
            self.set_mode(FocusMode::Active);
        }
    }

    /// Show the most recent backend error again.
    pub fn show_last_error(&self) {
        match &self.last_error {
            Some(err) => self.present(err),
            None => tracing::debug!("no error recorded"),
        }
    }

    fn on_edit(&mut self, filename: &str, dirty: bool) {
        if !self.mode.is_on() || !dirty || !self.is_active_file(filename) {
            return;
        }
        tracing::debug!(file = filename, "document edited, dropping focus state");
        self.set_mode(FocusMode::Unsaved);
        self.renderer.clear_all();
        self.drop_documents();
    }

    async fn on_save(&mut self, filename: &str) {
        if !self.mode.is_on() || !self.is_active_file(filename) {
            return;
        }
        self.set_mode(FocusMode::Active);
        self.update_slice().await;
    }

    /// Recompute and render the slice for the active editor selection.
    async fn update_slice(&mut self) {
        let Some(editor) = self.editor.clone() else {
            return;
        };
        if !self.settings.tracks(&editor.filename) {
            return;
        }
        if matches!(
            self.mode,
            FocusMode::Idle | FocusMode::Unsaved | FocusMode::Loading
        ) {
            return;
        }

        self.set_mode(FocusMode::Loading);
        let result = match self.active_document().await {
            Ok(doc) => {
                let (backend, renderer) = (Arc::clone(&self.backend), Arc::clone(&self.renderer));
                self.with_progress(doc.on_selection_changed(
                    &*backend,
                    &*renderer,
                    editor.selection,
                ))
                .await
            }
            Err(err) => Err(err),
        };

        if self.settle(result) {
            self.reporter.hide_build_error();
            self.set_mode(FocusMode::Active);
        }
    }

    /// Common gate for mark/unmark/select. Yields the selection to act on.
    fn prepare_command(&mut self) -> Option<Selection> {
        let editor = self.editor.clone()?;
        if !self.settings.tracks(&editor.filename) {
            return None;
        }
        match self.mode {
            FocusMode::Idle | FocusMode::Unsaved | FocusMode::Loading => None,
            FocusMode::Error => {
                // Retry from scratch.
                if let Some(doc) = self.documents.remove(&editor.filename) {
                    doc.invalidate();
                }
                self.set_mode(FocusMode::Active);
                Some(editor.selection)
            }
            FocusMode::Active => Some(editor.selection),
        }
    }

    /// Focus state for the active editor's document, loading it on first use.
    async fn active_document(&mut self) -> Result<Arc<DocumentFocusState>, BackendError> {
        let Some(filename) = self.editor.as_ref().map(|editor| editor.filename.clone()) else {
            return Err(BackendError::analysis("no active editor"));
        };
        if let Some(doc) = self.documents.get(&filename) {
            return Ok(Arc::clone(doc));
        }

        let backend = Arc::clone(&self.backend);
        let doc = Arc::new(
            self.with_progress(DocumentFocusState::load(&*backend, &filename))
                .await?,
        );
        self.documents.insert(filename, Arc::clone(&doc));
        Ok(doc)
    }

    /// Await `operation`, showing progress feedback if it outlives the configured delay.
    async fn with_progress<T>(&self, operation: impl Future<Output = T>) -> T {
        let delay = self.settings.progress_delay();
        tokio::pin!(operation);
        let early = tokio::select! {
            output = &mut operation => Some(output),
            _ = tokio::time::sleep(delay) => None,
        };
        if let Some(output) = early {
            return output;
        }

        self.reporter.show_progress(PROGRESS_TITLE);
        let output = operation.await;
        self.reporter.hide_progress();
        output
    }

    /// Report a failed operation and enter the error state. Returns whether it succeeded.
    fn settle(&mut self, result: Result<(), BackendError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "focus update failed");
                self.present(&err);
                self.last_error = Some(err);
                self.set_mode(FocusMode::Error);
                false
            }
        }
    }

    fn present(&self, err: &BackendError) {
        match err {
            BackendError::Build { message } => self.reporter.show_build_error(message),
            BackendError::Analysis { message } => self.reporter.notify_error(message),
        }
    }

    fn is_active_file(&self, filename: &str) -> bool {
        self.editor
            .as_ref()
            .is_some_and(|editor| editor.filename == filename)
            && self.settings.tracks(filename)
    }

    fn drop_documents(&mut self) {
        for (_, doc) in self.documents.drain() {
            doc.invalidate();
        }
    }

    fn set_mode(&mut self, mode: FocusMode) {
        if self.mode != mode {
            tracing::debug!(from = ?self.mode, to = ?mode, "focus mode transition");
        }
        self.mode = mode;
        self.reporter.set_status(mode);
    }
}
