//! Focus state for one document: its bodies and their lazily loaded analyses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::app::body::BodyFocusState;
use crate::app::memo::{CellState, MemoCell};
use crate::app::range_index::RangeIndex;
use crate::domain::errors::BackendError;
use crate::domain::model::Spans;
use crate::domain::range::{RangedValue, Selection};
use crate::infra::backend::{self, Backend};
use crate::infra::render::Renderer;

/// Outcome of a body analysis. Failures are cached like successes.
pub type BodyResult = Result<Arc<BodyFocusState>, BackendError>;

/// Index of a document's bodies, each with a memoized analysis slot.
#[derive(Debug)]
pub struct DocumentFocusState {
    filename: String,
    bodies: RangeIndex<MemoCell<BodyResult>>,
    invalidated: AtomicBool,
}

impl DocumentFocusState {
    pub fn new(filename: impl Into<String>, spans: Spans) -> Self {
        let bodies = spans
            .spans
            .into_iter()
            .map(|range| RangedValue::new(range, MemoCell::new()))
            .collect();
        Self {
            filename: filename.into(),
            bodies,
            invalidated: AtomicBool::new(false),
        }
    }

    /// List the bodies of `filename` through the backend `spans` subcommand.
    pub async fn load<B: Backend + ?Sized>(
        backend: &B,
        filename: &str,
    ) -> Result<Self, BackendError> {
        let spans = backend::spans(backend, filename).await?;
        tracing::debug!(file = filename, bodies = spans.spans.len(), "indexed bodies");
        Ok(Self::new(filename, spans))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of bodies whose analysis has finished, successfully or not.
    pub fn loaded_bodies(&self) -> usize {
        self.bodies
            .iter()
            .filter(|body| body.value.state() == CellState::Ready)
            .count()
    }

    /// Mark this state stale. Results that arrive afterwards are cached but not rendered.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Resolve the narrowest body enclosing `selection`, analyzing it on first access.
    ///
    /// Returns `None` when no body encloses the selection. Each body is analyzed at most
    /// once per document state, concurrent callers included.
    pub async fn body_state<B: Backend + ?Sized>(
        &self,
        backend: &B,
        selection: Selection,
    ) -> Option<BodyResult> {
        let query = selection.interval();
        let result = self.bodies.query(query);
        // A body equal to the selection is classified as contained, but still encloses it.
        let body = result
            .contained
            .iter()
            .find(|body| body.range.interval() == query)
            .or(result.containing.first())?;

        let filename = self.filename.as_str();
        let slot = body.value.get_or_init(move || async move {
            tracing::debug!(file = filename, body = %body.range, "analyzing body");
            BodyFocusState::load(backend, filename, selection)
                .await
                .map(Arc::new)
        });
        Some(slot.await.clone())
    }

    /// Render the slice for `selection` in the body it falls in, if any.
    pub async fn on_selection_changed<B: Backend + ?Sized>(
        &self,
        backend: &B,
        renderer: &dyn Renderer,
        selection: Selection,
    ) -> Result<(), BackendError> {
        let Some(body) = self.body_state(backend, selection).await.transpose()? else {
            return Ok(());
        };
        if self.is_invalidated() {
            tracing::debug!(file = %self.filename, "dropping result for stale document");
            return Ok(());
        }
        body.render(renderer, selection);
        Ok(())
    }

    /// Pin `selection` as the mark of the body it falls in.
    pub async fn set_mark<B: Backend + ?Sized>(
        &self,
        backend: &B,
        selection: Selection,
    ) -> Result<(), BackendError> {
        if let Some(body) = self.body_state(backend, selection).await.transpose()? {
            body.set_mark(selection);
        }
        Ok(())
    }

    /// Drop the mark of the body `selection` falls in.
    pub async fn clear_mark<B: Backend + ?Sized>(
        &self,
        backend: &B,
        selection: Selection,
    ) -> Result<(), BackendError> {
        if let Some(body) = self.body_state(backend, selection).await.transpose()? {
            body.clear_mark();
        }
        Ok(())
    }

    /// Turn the slice for `selection` into editor selections.
    pub async fn select<B: Backend + ?Sized>(
        &self,
        backend: &B,
        renderer: &dyn Renderer,
        selection: Selection,
    ) -> Result<(), BackendError> {
        if let Some(body) = self.body_state(backend, selection).await.transpose()? {
            if !self.is_invalidated() {
                body.select(renderer, selection);
            }
        }
        Ok(())
    }
}
