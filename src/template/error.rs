//! Template error types

use std::fmt;

/// Stage of rendering at which an expression failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderErrorKind {
    /// The text could not be parsed (e.g. unbalanced delimiters)
    Parse,
    /// The text parsed but evaluating it failed (e.g. undefined path)
    Evaluation,
}

/// Errors that can occur while rendering a templated string
#[derive(Debug)]
pub enum TemplateError {
    /// Template syntax is invalid
    Parse {
        /// Path of the field being rendered, empty for a bare string
        field: String,
        /// Underlying minijinja error
        source: minijinja::Error,
    },
    /// Template evaluation failed
    Evaluation {
        /// Path of the field being rendered, empty for a bare string
        field: String,
        /// Underlying minijinja error
        source: minijinja::Error,
    },
}

impl TemplateError {
    /// Which rendering stage failed
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            Self::Parse { .. } => RenderErrorKind::Parse,
            Self::Evaluation { .. } => RenderErrorKind::Evaluation,
        }
    }

    /// Path of the field whose value failed to render
    pub fn field(&self) -> &str {
        match self {
            Self::Parse { field, .. } | Self::Evaluation { field, .. } => field,
        }
    }

    /// Attach the path of the field being rendered
    pub(crate) fn at(mut self, path: &str) -> Self {
        match &mut self {
            Self::Parse { field, .. } | Self::Evaluation { field, .. } => {
                *field = path.to_string();
            }
        }
        self
    }

    pub(crate) fn parse(source: minijinja::Error) -> Self {
        Self::Parse {
            field: String::new(),
            source,
        }
    }

    pub(crate) fn evaluation(source: minijinja::Error) -> Self {
        Self::Evaluation {
            field: String::new(),
            source,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (stage, field, source) = match self {
            Self::Parse { field, source } => ("parse", field, source),
            Self::Evaluation { field, source } => ("evaluation", field, source),
        };
        if field.is_empty() {
            write!(f, "template {} failed: {}", stage, source)
        } else {
            write!(f, "template {} failed at {}: {}", stage, field, source)
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse { source, .. } | Self::Evaluation { source, .. } => Some(source),
        }
    }
}
