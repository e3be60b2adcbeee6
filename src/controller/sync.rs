//! Template synchronization
//!
//! One pass for a template identity:
//! 1. Fetch the template; a missing template means it was deleted
//! 2. Fetch the target with the same name and namespace
//! 3. Absent: render, create with an owner reference, ask to be requeued
//! 4. Present: render, and replace the target spec only if it differs
//! 5. Mirror a reference to the target into the template's status if it
//!    differs from the stored one
//!
//! Any failure aborts the pass. Nothing is retried here; the controller
//! runtime re-runs the whole pass.

use std::sync::Arc;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use crate::crd::{Object, Templated};
use crate::store::Store;
use crate::template::{expand, TemplateContext, TemplateEngine};
use crate::Error;

/// Result of a successful pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The target was just created and the pass should run again to
    /// propagate its reference
    pub requeue: bool,
}

/// Synchronizes templates of kind `T` with their targets
pub struct Reconciler<T: Templated> {
    templates: Arc<dyn Store<T>>,
    targets: Arc<dyn Store<T::Target>>,
    engine: TemplateEngine,
}

impl<T: Templated> Reconciler<T> {
    /// Create a reconciler over the given template and target stores
    pub fn new(templates: Arc<dyn Store<T>>, targets: Arc<dyn Store<T::Target>>) -> Self {
        Self {
            templates,
            targets,
            engine: TemplateEngine::new(),
        }
    }

    /// Run one pass for the template `namespace/name`
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, Error> {
        let Some(template) = self.templates.get(namespace, name).await? else {
            info!("template not found, ignoring since it must have been deleted");
            return Ok(ReconcileOutcome::default());
        };

        let target = match self.targets.get(namespace, name).await? {
            None => {
                let target = self.build_target(&template)?;
                self.targets.create(&target).await?;
                info!(kind = %T::Target::kind(&()), "created target");
                return Ok(ReconcileOutcome { requeue: true });
            }
            Some(target) => self.sync_spec(&template, target).await?,
        };

        self.sync_status(template, &target).await?;
        Ok(ReconcileOutcome::default())
    }

    /// Render the template's spec against the template itself
    pub fn render_spec(&self, template: &T) -> Result<T::Spec, Error> {
        let ctx = TemplateContext::from_resource(template)?;
        expand(&self.engine, template.template_spec(), &ctx)
    }

    /// Build the target a template renders into, ready to be created
    pub fn build_target(&self, template: &T) -> Result<T::Target, Error> {
        render_target(&self.engine, template)
    }

    async fn sync_spec(&self, template: &T, mut target: T::Target) -> Result<T::Target, Error> {
        let spec = self.render_spec(template)?;
        if T::target_spec(&target) == &spec {
            debug!("target spec up to date");
            return Ok(target);
        }

        T::set_target_spec(&mut target, spec);
        let updated = self.targets.update(&target).await?;
        info!(
            kind = %T::Target::kind(&()),
            resource_version = %updated.resource_version().unwrap_or_default(),
            "updated target spec"
        );
        Ok(updated)
    }

    async fn sync_status(&self, mut template: T, target: &T::Target) -> Result<(), Error> {
        let reference = target_reference(target);
        if template.target_ref() == Some(&reference) {
            debug!("target reference up to date");
            return Ok(());
        }

        template.set_target_ref(reference);
        self.templates.update_status(&template).await?;
        info!("updated target reference");
        Ok(())
    }
}

/// Render a template into a new target
///
/// The target takes the template's name, namespace, labels and annotations,
/// the rendered spec, and a controller owner reference to the template.
///
/// # Errors
///
/// Fails if rendering fails, or with `Error::InvariantViolation` if the
/// template has no uid and so cannot own the target.
pub fn render_target<T: Templated>(engine: &TemplateEngine, template: &T) -> Result<T::Target, Error> {
    let owner = template.controller_owner_ref(&()).ok_or_else(|| {
        Error::invariant(format!(
            "{} {} has no uid and cannot own a target",
            T::kind(&()),
            template.name_any()
        ))
    })?;

    let mut target = preview_target(engine, template)?;
    target.meta_mut().owner_references = Some(vec![owner]);
    Ok(target)
}

/// Render a template into the target it would produce, without ownership
///
/// Used to inspect a manifest before it is applied, when the template has
/// not been stored and has no uid yet.
pub fn preview_target<T: Templated>(engine: &TemplateEngine, template: &T) -> Result<T::Target, Error> {
    let ctx = TemplateContext::from_resource(template)?;
    let spec = expand(engine, template.template_spec(), &ctx)?;

    let mut target = T::new_target(&template.name_any(), spec);
    let meta = target.meta_mut();
    meta.namespace = template.namespace();
    meta.labels = template.meta().labels.clone();
    meta.annotations = template.meta().annotations.clone();
    Ok(target)
}

/// Reference describing a target, as stored in a template's status
pub fn target_reference<K: Object>(target: &K) -> ObjectReference {
    let meta = target.meta();
    ObjectReference {
        api_version: Some(K::api_version(&()).into_owned()),
        kind: Some(K::kind(&()).into_owned()),
        namespace: meta.namespace.clone(),
        name: meta.name.clone(),
        uid: meta.uid.clone(),
        resource_version: meta.resource_version.clone(),
        field_path: None,
    }
}
