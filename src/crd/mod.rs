//! Custom Resource Definitions for the templater
//!
//! - Template kinds (`config-connector-templater.slamdev.net/v1alpha1`), authored by users
//! - Target kinds (`pubsub.cnrm.cloud.google.com/v1beta1`), owned by Config
//!   Connector and written by the operator
//! - [`Templated`], which pairs each template kind with its target kind

mod pubsub;
mod template;
mod types;

use std::fmt::Debug;

use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::NamespaceResourceScope;
use kube::{CustomResourceExt, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use pubsub::{
    PubSubSubscription, PubSubSubscriptionSpec, PubSubTopic, PubSubTopicSpec,
    SubscriptionDeadLetterPolicy, SubscriptionExpirationPolicy, SubscriptionOidcToken,
    SubscriptionPushConfig, SubscriptionRetryPolicy, TopicMessageStoragePolicy,
    TopicSchemaSettings,
};
pub use template::{
    PubSubSubscriptionTemplate, PubSubSubscriptionTemplateSpec, PubSubTopicTemplate,
    PubSubTopicTemplateSpec,
};
pub use types::{Condition, ConditionStatus, ResourceRef, TargetStatus, TemplateStatus};

/// A namespaced Kubernetes object the operator can read and write
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Pairs a template kind with the target kind it renders into
///
/// The template's spec and the target's spec share one type, so rendering
/// maps a `Spec` to a `Spec` and diffing is plain `PartialEq`.
pub trait Templated: Object {
    /// The concrete resource this template renders into
    type Target: Object;

    /// Spec shared by the template and its target
    type Spec: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Name used for the controller's log fields
    const CONTROLLER_ID: &'static str;

    /// The unrendered spec carried by the template
    fn template_spec(&self) -> &Self::Spec;

    /// Reference to the target stored in the template's status
    fn target_ref(&self) -> Option<&ObjectReference>;

    /// Store a reference to the target in the template's status
    fn set_target_ref(&mut self, reference: ObjectReference);

    /// The target's current spec
    fn target_spec(target: &Self::Target) -> &Self::Spec;

    /// Replace the target's spec
    fn set_target_spec(target: &mut Self::Target, spec: Self::Spec);

    /// Construct a target with the given name and spec and empty metadata
    fn new_target(name: &str, spec: Self::Spec) -> Self::Target;
}

macro_rules! impl_templated {
    ($template:ty => $target:ident, $spec:ty, $id:literal) => {
        impl Templated for $template {
            type Target = $target;
            type Spec = $spec;

            const CONTROLLER_ID: &'static str = $id;

            fn template_spec(&self) -> &Self::Spec {
                &self.spec.template
            }

            fn target_ref(&self) -> Option<&ObjectReference> {
                self.status.as_ref().and_then(|s| s.target_ref.as_ref())
            }

            fn set_target_ref(&mut self, reference: ObjectReference) {
                self.status
                    .get_or_insert_with(TemplateStatus::default)
                    .target_ref = Some(reference);
            }

            fn target_spec(target: &Self::Target) -> &Self::Spec {
                &target.spec
            }

            fn set_target_spec(target: &mut Self::Target, spec: Self::Spec) {
                target.spec = spec;
            }

            fn new_target(name: &str, spec: Self::Spec) -> Self::Target {
                $target::new(name, spec)
            }
        }
    };
}

impl_templated!(PubSubTopicTemplate => PubSubTopic, PubSubTopicSpec, "pubsubtopictemplate");
impl_templated!(
    PubSubSubscriptionTemplate => PubSubSubscription,
    PubSubSubscriptionSpec,
    "pubsubsubscriptiontemplate"
);

/// CRDs for every template kind served by the operator
pub fn template_crds() -> Vec<CustomResourceDefinition> {
    vec![PubSubTopicTemplate::crd(), PubSubSubscriptionTemplate::crd()]
}

/// Stand-in CRDs for the target kinds
///
/// Config Connector installs the real ones; these are for clusters without
/// it, such as local test clusters.
pub fn target_crds() -> Vec<CustomResourceDefinition> {
    vec![PubSubTopic::crd(), PubSubSubscription::crd()]
}
