//! Integration tests against a real API server
//!
//! These tests require a Kubernetes cluster (kind) and tell the story of how
//! teams use templates to stamp out Config Connector resources.
//!
//! # Test Organization
//!
//! - `template_lifecycle`: Stories about templates being created, edited and
//!   deleted while a controller runs, and what happens to their targets
//!
//! The cluster gets the template CRDs plus stand-in CRDs for the target
//! kinds, so Config Connector itself is not needed.
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod helpers;
mod template_lifecycle;
