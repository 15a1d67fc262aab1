//! Focus engine: range indexing, slice resolution and the focus mode state machine.

pub mod body;
pub mod controller;
pub mod document;
pub mod memo;
pub mod range_index;
pub mod ranges;
