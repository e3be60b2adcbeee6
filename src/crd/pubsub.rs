//! Config Connector Pub/Sub target resources
//!
//! These mirror the `pubsub.cnrm.cloud.google.com/v1beta1` kinds the operator
//! renders into. Only the spec is modelled field by field; Config Connector
//! owns the status.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ResourceRef, TargetStatus};

/// Specification for a PubSubTopic
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "pubsub.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "PubSubTopic",
    plural = "pubsubtopics",
    status = "TargetStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PubSubTopicSpec {
    /// Cloud KMS key used to protect access to messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_ref: Option<ResourceRef>,

    /// How long unacknowledged messages are retained, e.g. `86400s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_retention_duration: Option<String>,

    /// Regions where messages may be persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_storage_policy: Option<TopicMessageStoragePolicy>,

    /// Immutable cloud name of the topic, defaults to metadata.name
    #[serde(rename = "resourceID", default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Schema that messages published to the topic must follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_settings: Option<TopicSchemaSettings>,
}

/// Message storage policy of a topic
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessageStoragePolicy {
    /// Cloud regions where messages may be stored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_persistence_regions: Vec<String>,
}

/// Schema settings of a topic
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicSchemaSettings {
    /// Message encoding, `JSON` or `BINARY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// The PubSubSchema to validate against
    pub schema_ref: ResourceRef,
}

/// Specification for a PubSubSubscription
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "pubsub.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "PubSubSubscription",
    plural = "pubsubsubscriptions",
    status = "TargetStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PubSubSubscriptionSpec {
    /// Seconds a subscriber has to acknowledge a message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_deadline_seconds: Option<i64>,

    /// Where undeliverable messages are forwarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_policy: Option<SubscriptionDeadLetterPolicy>,

    /// Deliver every message exactly once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_exactly_once_delivery: Option<bool>,

    /// Deliver messages with the same ordering key in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_message_ordering: Option<bool>,

    /// When an inactive subscription expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_policy: Option<SubscriptionExpirationPolicy>,

    /// Attribute filter applied to delivered messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// How long acknowledged messages are retained, e.g. `604800s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_retention_duration: Option<String>,

    /// Push delivery settings; pull delivery when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_config: Option<SubscriptionPushConfig>,

    /// Immutable cloud name of the subscription, defaults to metadata.name
    #[serde(rename = "resourceID", default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Keep acknowledged messages for the retention duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_acked_messages: Option<bool>,

    /// Redelivery backoff for failed messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<SubscriptionRetryPolicy>,

    /// The topic to subscribe to
    pub topic_ref: ResourceRef,
}

/// Dead letter policy of a subscription
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDeadLetterPolicy {
    /// Topic receiving dead-lettered messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_topic_ref: Option<ResourceRef>,

    /// Delivery attempts before a message is dead-lettered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delivery_attempts: Option<i64>,
}

/// Expiration policy of a subscription
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionExpirationPolicy {
    /// Inactivity period after which the subscription is deleted
    pub ttl: String,
}

/// Push delivery settings of a subscription
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPushConfig {
    /// Endpoint attributes, e.g. `x-goog-version`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// OIDC token attached to every push request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_token: Option<SubscriptionOidcToken>,

    /// URL receiving pushed messages
    pub push_endpoint: String,
}

/// OIDC token settings for push delivery
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOidcToken {
    /// Audience claim of the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Service account used to mint the token
    pub service_account_email: String,
}

/// Retry policy of a subscription
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRetryPolicy {
    /// Upper bound of the redelivery delay, e.g. `600s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_backoff: Option<String>,

    /// Lower bound of the redelivery delay, e.g. `10s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_backoff: Option<String>,
}
