//! Expression rendering for templated resource specs
//!
//! Every string field of a template's embedded target spec may contain
//! minijinja expressions. They are evaluated against the template record
//! itself, serialized under its wire field names.
//!
//! # Expressions
//!
//! - `{{ .metadata.name }}` / `{{ metadata.name }}` - Template name
//! - `{{ .metadata.namespace }}` - Template namespace
//! - `{{ .metadata.labels.KEY }}`, `{{ .metadata.annotations["KEY"] }}`
//! - `{{ .spec.FIELD }}` - The template's own (unrendered) spec
//! - `{% if %}...{% endif %}`, `{% for %}...{% endfor %}` - Blocks
//! - Filters: `{{ value | default("fallback") }}`, `{{ value | b64enc }}`, ...
//!
//! Undefined references are errors, never empty strings.

mod context;
mod engine;
mod error;
mod expand;
mod filters;

pub use context::TemplateContext;
pub use engine::TemplateEngine;
pub use error::{RenderErrorKind, TemplateError};
pub use expand::{expand, expand_json};
