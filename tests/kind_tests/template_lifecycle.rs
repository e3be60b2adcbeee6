//! Integration tests for the template lifecycle
//!
//! These tests run a real controller against the kind cluster and follow a
//! template from creation through edits to deletion.

use std::collections::BTreeMap;
use std::time::Duration;

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tokio::task::JoinHandle;

use templater::controller::{self, ControllerConfig};
use templater::crd::{PubSubTopic, PubSubTopicSpec, PubSubTopicTemplate, PubSubTopicTemplateSpec};

use super::helpers::{ensure_test_cluster, fresh_namespace, wait_for};

// =============================================================================
// Test Fixtures
// =============================================================================

const TIMEOUT: Duration = Duration::from_secs(30);

/// Start a topic controller watching only `namespace`
fn start_topic_controller(client: Client, namespace: &str) -> JoinHandle<()> {
    let config = ControllerConfig {
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    tokio::spawn(controller::run::<PubSubTopicTemplate>(client, config))
}

fn sample_topic_template(namespace: &str, name: &str, team: &str) -> PubSubTopicTemplate {
    let mut template = PubSubTopicTemplate::new(
        name,
        PubSubTopicTemplateSpec {
            template: PubSubTopicSpec {
                resource_id: Some("{{ .metadata.labels.team }}-{{ .metadata.name }}".to_string()),
                message_retention_duration: Some("86400s".to_string()),
                ..Default::default()
            },
        },
    );
    template.metadata.namespace = Some(namespace.to_string());
    template.metadata.labels = Some(BTreeMap::from([("team".to_string(), team.to_string())]));
    template
}

async fn topic_resource_id(topics: &Api<PubSubTopic>, name: &str) -> Option<String> {
    topics
        .get_opt(name)
        .await
        .ok()
        .flatten()
        .and_then(|topic| topic.spec.resource_id)
}

// =============================================================================
// Stories
// =============================================================================

/// Story: A team applies a topic template. The controller creates a topic
/// with the rendered spec, owned by the template, and records a reference
/// to it in the template's status.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_template_creates_owned_topic() {
    let client = ensure_test_cluster().await.expect("test cluster");
    let ns = "templater-create";
    fresh_namespace(&client, ns).await.expect("namespace");
    let controller = start_topic_controller(client.clone(), ns);

    let templates: Api<PubSubTopicTemplate> = Api::namespaced(client.clone(), ns);
    let topics: Api<PubSubTopic> = Api::namespaced(client.clone(), ns);
    let (templates, topics) = (&templates, &topics);
    let created = templates
        .create(&PostParams::default(), &sample_topic_template(ns, "orders", "payments"))
        .await
        .expect("create template");

    let rendered = wait_for(TIMEOUT, || async move {
        topic_resource_id(topics, "orders").await.as_deref() == Some("payments-orders")
    })
    .await;
    assert!(rendered, "topic was not rendered");

    let topic = topics.get("orders").await.expect("topic");
    let owners = topic.metadata.owner_references.expect("owner reference");
    assert_eq!(owners[0].uid, created.metadata.uid.expect("uid"));
    assert_eq!(owners[0].controller, Some(true));

    let topic_uid = &topic.metadata.uid;

    let recorded = wait_for(TIMEOUT, || async move {
        templates
            .get("orders")
            .await
            .ok()
            .and_then(|t| t.status)
            .and_then(|s| s.target_ref)
            .is_some_and(|r| &r.uid == topic_uid)
    })
    .await;
    assert!(recorded, "template status never referenced the topic");

    controller.abort();
}

/// Story: A team relabels their template. The controller re-renders and
/// the topic follows.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_template_edit_updates_topic() {
    let client = ensure_test_cluster().await.expect("test cluster");
    let ns = "templater-edit";
    fresh_namespace(&client, ns).await.expect("namespace");
    let controller = start_topic_controller(client.clone(), ns);

    let templates: Api<PubSubTopicTemplate> = Api::namespaced(client.clone(), ns);
    let topics: Api<PubSubTopic> = Api::namespaced(client.clone(), ns);
    let (templates, topics) = (&templates, &topics);
    templates
        .create(&PostParams::default(), &sample_topic_template(ns, "orders", "payments"))
        .await
        .expect("create template");
    assert!(
        wait_for(TIMEOUT, || async move {
            topic_resource_id(topics, "orders").await.is_some()
        })
        .await
    );

    let patch = serde_json::json!({"metadata": {"labels": {"team": "billing"}}});
    templates
        .patch("orders", &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .expect("relabel template");

    let updated = wait_for(TIMEOUT, || async move {
        topic_resource_id(topics, "orders").await.as_deref() == Some("billing-orders")
    })
    .await;
    assert!(updated, "topic did not follow the template edit");

    controller.abort();
}

/// Story: A team deletes their template. The controller does nothing, and
/// the garbage collector removes the owned topic.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_template_delete_collects_topic() {
    let client = ensure_test_cluster().await.expect("test cluster");
    let ns = "templater-delete";
    fresh_namespace(&client, ns).await.expect("namespace");
    let controller = start_topic_controller(client.clone(), ns);

    let templates: Api<PubSubTopicTemplate> = Api::namespaced(client.clone(), ns);
    let topics: Api<PubSubTopic> = Api::namespaced(client.clone(), ns);
    let (templates, topics) = (&templates, &topics);
    templates
        .create(&PostParams::default(), &sample_topic_template(ns, "orders", "payments"))
        .await
        .expect("create template");
    assert!(
        wait_for(TIMEOUT, || async move {
            topic_resource_id(topics, "orders").await.is_some()
        })
        .await
    );

    templates
        .delete("orders", &DeleteParams::background())
        .await
        .expect("delete template");

    let collected = wait_for(Duration::from_secs(60), || async move {
        matches!(topics.get_opt("orders").await, Ok(None))
    })
    .await;
    assert!(collected, "owned topic was not garbage collected");

    controller.abort();
}
