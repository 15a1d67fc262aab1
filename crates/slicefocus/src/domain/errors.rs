//! Domain-specific errors.

use serde::Deserialize;
use thiserror::Error;

/// Failure reported by the analysis backend.
///
/// The serde representation matches what the backend writes into the `Err` arm of its
/// response envelope: `{"type": "BuildError", "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[serde(tag = "type")]
pub enum BackendError {
    /// The analyzed project failed to compile. Blocks all analysis until fixed.
    #[error("project failed to build: {message}")]
    #[serde(rename = "BuildError")]
    Build {
        #[serde(rename = "error")]
        message: String,
    },
    /// The analysis failed for one query.
    #[error("analysis failed: {message}")]
    #[serde(rename = "AnalysisError")]
    Analysis {
        #[serde(rename = "error")]
        message: String,
    },
}

impl BackendError {
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build {
            message: message.into(),
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Build { message } | Self::Analysis { message } => message,
        }
    }

    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid range {start}..{end}: start is past end")]
    InvalidRange { start: usize, end: usize },
}
