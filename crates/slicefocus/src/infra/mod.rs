//! Infrastructure adapters for the analysis backend, editor surfaces, config and logging.

pub mod backend;
pub mod config;
pub mod logging;
pub mod render;
