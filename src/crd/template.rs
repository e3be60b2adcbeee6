//! Template Custom Resource Definitions
//!
//! A template's spec is exactly its target's spec (flattened on the wire),
//! except that any string field may contain expressions.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::pubsub::{PubSubSubscriptionSpec, PubSubTopicSpec};
use super::types::TemplateStatus;

/// Specification for a PubSubTopicTemplate
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "config-connector-templater.slamdev.net",
    version = "v1alpha1",
    kind = "PubSubTopicTemplate",
    plural = "pubsubtopictemplates",
    shortname = "pstt",
    status = "TemplateStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".status.ref.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct PubSubTopicTemplateSpec {
    /// Templated PubSubTopic spec
    #[serde(flatten)]
    pub template: PubSubTopicSpec,
}

/// Specification for a PubSubSubscriptionTemplate
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "config-connector-templater.slamdev.net",
    version = "v1alpha1",
    kind = "PubSubSubscriptionTemplate",
    plural = "pubsubsubscriptiontemplates",
    shortname = "psst",
    status = "TemplateStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".status.ref.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct PubSubSubscriptionTemplateSpec {
    /// Templated PubSubSubscription spec
    #[serde(flatten)]
    pub template: PubSubSubscriptionSpec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_spec_has_target_shape() {
        let spec: PubSubTopicTemplateSpec = serde_json::from_value(json!({
            "resourceID": "{{ .metadata.namespace }}.orders",
            "messageRetentionDuration": "86400s"
        }))
        .expect("topic fields parse at the top of the template spec");

        assert_eq!(
            spec.template.resource_id.as_deref(),
            Some("{{ .metadata.namespace }}.orders")
        );

        let back = serde_json::to_value(&spec).expect("serialize");
        assert_eq!(
            back,
            json!({
                "messageRetentionDuration": "86400s",
                "resourceID": "{{ .metadata.namespace }}.orders"
            })
        );
    }

    #[test]
    fn test_subscription_template_requires_topic_ref() {
        let result = serde_json::from_value::<PubSubSubscriptionTemplateSpec>(json!({
            "ackDeadlineSeconds": 10
        }));
        assert!(result.is_err());
    }
}
