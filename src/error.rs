//! Error types for the templater operator

use thiserror::Error;

use crate::store::StoreError;
use crate::template::{RenderErrorKind, TemplateError};

/// Main error type for templater operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A template expression failed to parse or evaluate
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The resource store rejected or failed a request
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Template and target shapes disagree, or a record is missing data the
    /// sync engine relies on
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Create an invariant violation error with the given message
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether re-running the reconciliation pass may succeed without the
    /// template being changed first
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Template(_) | Error::InvariantViolation(_) => false,
            Error::Store(_) => true,
        }
    }

    /// Short machine-readable reason, used as a log field
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Template(e) => match e.kind() {
                RenderErrorKind::Parse => "TemplateParseFailure",
                RenderErrorKind::Evaluation => "TemplateEvaluationFailure",
            },
            Error::Store(StoreError::NotFound { .. }) => "NotFound",
            Error::Store(StoreError::Conflict(_)) => "Conflict",
            Error::Store(StoreError::Other(_)) => "StoreError",
            Error::InvariantViolation(_) => "InvariantViolation",
        }
    }
}
