//! Value types shared by the focus engine and its adapters.

pub mod errors;
pub mod model;
pub mod range;
