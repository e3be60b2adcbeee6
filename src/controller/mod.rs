//! Controllers for template CRDs
//!
//! One controller runs per [`Templated`] pair. It watches the template kind,
//! owns the target kind (so target changes re-trigger the owning template),
//! and delegates each pass to a [`Reconciler`].

mod sync;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use crate::crd::Templated;
use crate::store::KubeStore;
use crate::Error;

pub use sync::{preview_target, render_target, target_reference, ReconcileOutcome, Reconciler};

/// Runtime knobs shared by every controller
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Only watch this namespace; all namespaces when `None`
    pub namespace: Option<String>,
    /// Delay before the pass following a target creation
    pub requeue_after_create: Duration,
    /// Delay before retrying a pass that failed with a retryable error
    pub error_requeue: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            requeue_after_create: Duration::from_secs(1),
            error_requeue: Duration::from_secs(5),
        }
    }
}

/// Controller context for templates of kind `T`
pub struct Context<T: Templated> {
    /// Synchronization engine
    pub reconciler: Reconciler<T>,
    /// Runtime knobs
    pub config: ControllerConfig,
}

impl<T: Templated> Context<T> {
    /// Create a context backed by the Kubernetes API
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        let reconciler = Reconciler::new(
            Arc::new(KubeStore::<T>::new(client.clone())),
            Arc::new(KubeStore::<T::Target>::new(client)),
        );
        Self { reconciler, config }
    }
}

/// Reconcile a template
///
/// Requeues shortly after creating the target so the next pass can record
/// the target's reference; otherwise waits for the next change.
#[instrument(
    skip(template, ctx),
    fields(
        controller = T::CONTROLLER_ID,
        template = %template.name_any(),
        namespace = %template.namespace().unwrap_or_default(),
    )
)]
pub async fn reconcile<T: Templated>(template: Arc<T>, ctx: Arc<Context<T>>) -> Result<Action, Error> {
    debug!("reconciling template");

    let namespace = template.namespace().unwrap_or_default();
    let outcome = ctx
        .reconciler
        .reconcile(&namespace, &template.name_any())
        .await?;

    if outcome.requeue {
        Ok(Action::requeue(ctx.config.requeue_after_create))
    } else {
        Ok(Action::await_change())
    }
}

/// Error policy for template controllers
///
/// Store failures are retried after `error_requeue`. Template and invariant
/// failures wait for the template to change.
pub fn error_policy<T: Templated>(template: Arc<T>, error: &Error, ctx: Arc<Context<T>>) -> Action {
    error!(
        error = %error,
        reason = error.reason(),
        controller = T::CONTROLLER_ID,
        template = %template.name_any(),
        namespace = %template.namespace().unwrap_or_default(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.config.error_requeue)
    } else {
        Action::await_change()
    }
}

/// Run the controller for template kind `T` until a shutdown signal
pub async fn run<T: Templated>(client: Client, config: ControllerConfig) {
    let (templates, targets): (Api<T>, Api<T::Target>) = match &config.namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    info!(
        controller = T::CONTROLLER_ID,
        namespace = config.namespace.as_deref().unwrap_or("*"),
        "starting controller"
    );

    let ctx = Arc::new(Context::<T>::new(client, config));
    Controller::new(templates, WatcherConfig::default())
        .owns(targets, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile::<T>, error_policy::<T>, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(controller = T::CONTROLLER_ID, object = %obj.name, ?action, "reconciliation completed");
                }
                Err(e) => {
                    warn!(controller = T::CONTROLLER_ID, error = %e, "reconciliation error");
                }
            }
        })
        .await;

    info!(controller = T::CONTROLLER_ID, "controller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::crd::{PubSubTopic, PubSubTopicSpec, PubSubTopicTemplate, PubSubTopicTemplateSpec};
    use crate::store::{MemoryStore, Operation, StoreError};

    fn memory_context() -> (
        Arc<MemoryStore<PubSubTopicTemplate>>,
        Arc<MemoryStore<PubSubTopic>>,
        Arc<Context<PubSubTopicTemplate>>,
    ) {
        let templates = Arc::new(MemoryStore::<PubSubTopicTemplate>::new());
        let targets = Arc::new(MemoryStore::<PubSubTopic>::new());
        let reconciler: Reconciler<PubSubTopicTemplate> =
            Reconciler::new(templates.clone(), targets.clone());
        let ctx = Arc::new(Context {
            reconciler,
            config: ControllerConfig {
                namespace: None,
                requeue_after_create: Duration::from_secs(2),
                error_requeue: Duration::from_secs(7),
            },
        });
        (templates, targets, ctx)
    }

    fn template(resource_id: &str) -> PubSubTopicTemplate {
        let mut template = PubSubTopicTemplate::new(
            "orders",
            PubSubTopicTemplateSpec {
                template: PubSubTopicSpec {
                    resource_id: Some(resource_id.to_string()),
                    ..Default::default()
                },
            },
        );
        template.metadata.namespace = Some("default".to_string());
        template
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.namespace, None);
        assert_eq!(config.requeue_after_create, Duration::from_secs(1));
        assert_eq!(config.error_requeue, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_create_requeues_after_configured_delay() {
        let (templates, _, ctx) = memory_context();
        let stored = templates.insert(template("{{ .metadata.name }}"));

        let action = reconcile(Arc::new(stored), ctx).await.expect("reconcile");

        assert_eq!(action, Action::requeue(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_converged_template_awaits_change() {
        let (templates, _, ctx) = memory_context();
        let stored = Arc::new(templates.insert(template("orders")));
        reconcile(stored.clone(), ctx.clone()).await.expect("create");

        let action = reconcile(stored, ctx).await.expect("status");

        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_store_errors_are_retried() {
        let (templates, targets, ctx) = memory_context();
        let stored = Arc::new(templates.insert(template("orders")));
        targets.fail_next(Operation::Get, StoreError::Other("timeout".to_string()));

        let err = reconcile(stored.clone(), ctx.clone())
            .await
            .expect_err("target read fails");

        assert_eq!(
            error_policy(stored, &err, ctx),
            Action::requeue(Duration::from_secs(7))
        );
    }

    #[tokio::test]
    async fn test_template_errors_wait_for_a_change() {
        let (templates, targets, ctx) = memory_context();
        let stored = Arc::new(templates.insert(template("{{ .metadata.name ")));

        let err = reconcile(stored.clone(), ctx.clone())
            .await
            .expect_err("malformed expression");

        assert_eq!(error_policy(stored, &err, ctx), Action::await_change());
        assert!(targets.is_empty());
    }
}
