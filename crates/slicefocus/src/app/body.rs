//! Focus state for a single analyzed body.

use parking_lot::Mutex;

use crate::app::range_index::RangeIndex;
use crate::app::ranges::{dedup, invert_all};
use crate::domain::errors::BackendError;
use crate::domain::model::{FocusOutput, PlaceInfo};
use crate::domain::range::{Range, RangedValue, Selection};
use crate::infra::backend::{self, Backend};
use crate::infra::render::{Highlight, Renderer};

/// Places matched by a selection and the slice they induce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceSelection {
    /// Matched place ranges, without structural duplicates.
    pub seeds: Vec<Range>,
    /// Concatenation of the matched places' slices. May repeat ranges.
    pub slice: Vec<Range>,
}

/// Analysis result for one body, indexed by place, plus the user's sticky mark.
#[derive(Debug)]
pub struct BodyFocusState {
    focus: FocusOutput,
    places: RangeIndex<PlaceInfo>,
    mark: Mutex<Option<Selection>>,
}

impl BodyFocusState {
    pub fn new(focus: FocusOutput) -> Self {
        let places = focus
            .place_info
            .iter()
            .map(|info| RangedValue::new(info.range.clone(), info.clone()))
            .collect();
        Self {
            focus,
            places,
            mark: Mutex::new(None),
        }
    }

    /// Run the backend `focus` analysis for the body enclosing the selection anchor.
    pub async fn load<B: Backend + ?Sized>(
        backend: &B,
        filename: &str,
        selection: Selection,
    ) -> Result<Self, BackendError> {
        let focus = backend::focus(backend, filename, selection.anchor).await?;
        tracing::debug!(
            file = filename,
            body = %focus.body_range,
            places = focus.place_info.len(),
            "loaded body focus"
        );
        Ok(Self::new(focus))
    }

    pub fn body_range(&self) -> &Range {
        &self.focus.body_range
    }

    pub fn arg_range(&self) -> Option<&Range> {
        self.focus.arg_range.as_ref()
    }

    pub fn mark(&self) -> Option<Selection> {
        *self.mark.lock()
    }

    pub fn set_mark(&self, selection: Selection) {
        *self.mark.lock() = Some(selection);
    }

    pub fn clear_mark(&self) {
        *self.mark.lock() = None;
    }

    /// Resolve the places under the mark, or under `selection` when no mark is set.
    ///
    /// Places inside the query win. Otherwise partially overlapping places are taken along
    /// with only the narrowest enclosing place, so a cursor inside a small expression does
    /// not pull in every enclosing scope.
    pub fn resolve_slice_at(&self, selection: Selection) -> SliceSelection {
        let query = self.mark().unwrap_or(selection).interval();
        let result = self.places.query(query);

        let matched = if !result.contained.is_empty() {
            result.contained
        } else {
            let mut matched = result.overlapping;
            matched.extend(result.containing.first().copied());
            matched
        };

        SliceSelection {
            seeds: dedup(matched.iter().map(|place| place.range.clone())),
            slice: matched
                .iter()
                .flat_map(|place| place.value.slice.iter().cloned())
                .collect(),
        }
    }

    /// Ranges to dim for `slice`: everything in the body and argument list outside it.
    pub fn dimmed_ranges(&self, slice: &[Range]) -> Vec<Range> {
        invert_all(
            std::iter::once(self.body_range()).chain(self.arg_range()),
            slice,
        )
        .into_iter()
        .filter(|range| !range.is_empty())
        .collect()
    }

    /// Highlight the slice for `selection`, or clear every highlight if nothing matches.
    pub fn render(&self, renderer: &dyn Renderer, selection: Selection) {
        let SliceSelection { seeds, slice } = self.resolve_slice_at(selection);
        if seeds.is_empty() {
            renderer.clear_all();
            return;
        }

        renderer.set_highlight(Highlight::Selected, &seeds);
        renderer.set_highlight(Highlight::Dimmed, &self.dimmed_ranges(&slice));
    }

    /// Replace the editor selections with the slice for `selection`.
    pub fn select(&self, renderer: &dyn Renderer, selection: Selection) {
        let SliceSelection { seeds, slice } = self.resolve_slice_at(selection);
        if seeds.is_empty() {
            renderer.clear_all();
            return;
        }

        renderer.set_selections(&slice);
        if let Some(first) = slice.iter().min_by_key(|range| range.start) {
            renderer.reveal_range(first);
        }
    }
}
