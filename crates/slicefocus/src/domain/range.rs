//! Byte-offset ranges, query intervals and editor selections.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Byte interval `start..end` without a file attached. Used as a query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
}

impl Interval {
    /// Build an interval, swapping the bounds when given in reverse.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Zero-width interval at a cursor offset.
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely within `self`.
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Closed-bound intersection: touching intervals intersect, so a cursor sitting on a
    /// boundary still hits the range.
    pub fn intersects(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A byte range inside one source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct Range {
    pub start: usize,
    pub end: usize,
    pub filename: String,
}

#[derive(Deserialize)]
struct RawRange {
    start: usize,
    end: usize,
    filename: String,
}

impl TryFrom<RawRange> for Range {
    type Error = DomainError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Range::try_new(raw.start, raw.end, raw.filename)
    }
}

impl Range {
    /// Build a range, rejecting `start > end`.
    pub fn try_new(
        start: usize,
        end: usize,
        filename: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            filename: filename.into(),
        })
    }

    /// Build a range from an [`Interval`], which already upholds `start <= end`.
    pub fn from_interval(interval: Interval, filename: impl Into<String>) -> Self {
        Self {
            start: interval.start,
            end: interval.end,
            filename: filename.into(),
        }
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start,
            end: self.end,
        }
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.filename, self.start, self.end)
    }
}

/// A [`Range`] paired with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangedValue<T> {
    pub range: Range,
    pub value: T,
}

impl<T> RangedValue<T> {
    pub fn new(range: Range, value: T) -> Self {
        Self { range, value }
    }
}

/// An editor selection. The anchor is where the selection started and doubles as the
/// cursor offset handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub active: usize,
}

impl Selection {
    pub fn new(anchor: usize, active: usize) -> Self {
        Self { anchor, active }
    }

    /// Collapsed selection at a cursor offset.
    pub fn cursor(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn interval(&self) -> Interval {
        Interval::new(self.anchor, self.active)
    }
}
