//! Templater - renders templated Config Connector resources into concrete ones
//!
//! A template resource (e.g. `PubSubTopicTemplate`) carries the full spec of a
//! target resource (e.g. `PubSubTopic`) whose string fields may contain
//! minijinja expressions. The operator renders those expressions against the
//! template's own serialized form and keeps a single target resource with the
//! same name and namespace in sync.
//!
//! # Architecture
//!
//! - The template record is serialized into a [`template::TemplateContext`]
//! - The target spec is walked as a JSON tree and every string is rendered
//!   by the [`template::TemplateEngine`]
//! - The [`controller::Reconciler`] creates or updates the target and mirrors
//!   a reference to it into the template's status
//!
//! # Modules
//!
//! - [`crd`] - Template and target Custom Resource Definitions and the
//!   [`crd::Templated`] pairing trait
//! - [`template`] - Expression engine, filters, context builder and value walker
//! - [`store`] - Resource store abstraction (Kubernetes API and in-memory)
//! - [`controller`] - Synchronization engine and kube-runtime glue
//! - [`retry`] - Backoff helper for startup operations
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod controller;
pub mod crd;
pub mod error;
pub mod retry;
pub mod store;
pub mod template;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager name used for server-side apply of CRDs
pub const FIELD_MANAGER: &str = "templater";
