//! Static interval index answering contained/containing/overlapping queries.
//!
//! Entries are sorted by start offset once at construction and viewed as an implicit
//! balanced tree (each `[lo, hi)` slice is rooted at its midpoint). Every node records the
//! largest end offset in its subtree, which lets a query skip subtrees that end before the
//! query starts and stop descending right once starts pass the query end.

use std::cmp::Ordering;

use crate::domain::range::{Interval, RangedValue};

/// How an indexed entry relates to a query interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The entry lies inside the query. Entries equal to the query land here.
    Contained,
    /// The entry strictly encloses the query.
    Containing,
    /// The entry and the query intersect without either enclosing the other.
    Overlapping,
}

/// Classify an intersecting `entry` relative to `query`.
pub fn classify(entry: Interval, query: Interval) -> Relation {
    if query.contains(&entry) {
        Relation::Contained
    } else if entry.contains(&query) {
        Relation::Containing
    } else {
        Relation::Overlapping
    }
}

/// Entries intersecting a query, split by [`Relation`]. Each list is ordered by width,
/// narrowest first; equal widths keep insertion order.
#[derive(Debug)]
pub struct QueryResult<'a, T> {
    pub contained: Vec<&'a RangedValue<T>>,
    pub containing: Vec<&'a RangedValue<T>>,
    pub overlapping: Vec<&'a RangedValue<T>>,
}

impl<T> QueryResult<'_, T> {
    pub fn is_empty(&self) -> bool {
        self.contained.is_empty() && self.containing.is_empty() && self.overlapping.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contained.len() + self.containing.len() + self.overlapping.len()
    }
}

#[derive(Debug)]
struct Slot<T> {
    seq: usize,
    entry: RangedValue<T>,
}

/// Immutable interval index. Rebuild it when the underlying set changes.
#[derive(Debug)]
pub struct RangeIndex<T> {
    slots: Vec<Slot<T>>,
    max_end: Vec<usize>,
}

impl<T> Default for RangeIndex<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            max_end: Vec::new(),
        }
    }
}

impl<T> FromIterator<RangedValue<T>> for RangeIndex<T> {
    fn from_iter<I: IntoIterator<Item = RangedValue<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> RangeIndex<T> {
    /// Build the index in `O(n log n)`. Overlapping, nested, duplicate and zero-width
    /// entries are all accepted and kept as distinct entries.
    pub fn new(entries: Vec<RangedValue<T>>) -> Self {
        let mut slots: Vec<Slot<T>> = entries
            .into_iter()
            .enumerate()
            .map(|(seq, entry)| Slot { seq, entry })
            .collect();
        slots.sort_by(|a, b| {
            let (a, b) = (&a.entry.range, &b.entry.range);
            a.start.cmp(&b.start).then(a.end.cmp(&b.end))
        });

        let mut index = Self {
            max_end: vec![0; slots.len()],
            slots,
        };
        index.build(0, index.slots.len());
        index
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in start order.
    pub fn iter(&self) -> impl Iterator<Item = &RangedValue<T>> {
        self.slots.iter().map(|slot| &slot.entry)
    }

    /// Collect and classify every entry intersecting `query`.
    pub fn query(&self, query: Interval) -> QueryResult<'_, T> {
        let mut hits = Vec::new();
        self.collect(0, self.slots.len(), query, &mut hits);
        hits.sort_by(|a, b| by_width_then_seq(a, b));

        let mut result = QueryResult {
            contained: Vec::new(),
            containing: Vec::new(),
            overlapping: Vec::new(),
        };
        for slot in hits {
            let bucket = match classify(slot.entry.range.interval(), query) {
                Relation::Contained => &mut result.contained,
                Relation::Containing => &mut result.containing,
                Relation::Overlapping => &mut result.overlapping,
            };
            bucket.push(&slot.entry);
        }
        result
    }

    fn build(&mut self, lo: usize, hi: usize) -> usize {
        if lo >= hi {
            return 0;
        }
        let mid = lo + (hi - lo) / 2;
        let left = self.build(lo, mid);
        let right = self.build(mid + 1, hi);
        let max = self.slots[mid].entry.range.end.max(left).max(right);
        self.max_end[mid] = max;
        max
    }

    fn collect<'a>(&'a self, lo: usize, hi: usize, query: Interval, hits: &mut Vec<&'a Slot<T>>) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        if self.max_end[mid] < query.start {
            return;
        }

        self.collect(lo, mid, query, hits);

        let slot = &self.slots[mid];
        if slot.entry.range.start > query.end {
            return;
        }
        if slot.entry.range.interval().intersects(&query) {
            hits.push(slot);
        }

        self.collect(mid + 1, hi, query, hits);
    }
}

fn by_width_then_seq<T>(a: &Slot<T>, b: &Slot<T>) -> Ordering {
    a.entry
        .range
        .width()
        .cmp(&b.entry.range.width())
        .then(a.seq.cmp(&b.seq))
}
