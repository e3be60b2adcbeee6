//! Criterion benchmarks for template expansion
//!
//! Measures rendering a template spec, which happens on every pass for every
//! template, and a full converged pass against in-memory stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value as JsonValue};

use templater::controller::Reconciler;
use templater::crd::{
    PubSubTopic, PubSubTopicSpec, PubSubTopicTemplate, PubSubTopicTemplateSpec, ResourceRef,
    TopicMessageStoragePolicy,
};
use templater::store::MemoryStore;
use templater::template::{expand, expand_json, TemplateContext, TemplateEngine};

// =============================================================================
// Test Fixtures
// =============================================================================

fn labelled_template(templated: bool) -> PubSubTopicTemplate {
    let value = |expr: &str, literal: &str| {
        if templated {
            expr.to_string()
        } else {
            literal.to_string()
        }
    };

    let mut template = PubSubTopicTemplate::new(
        "orders",
        PubSubTopicTemplateSpec {
            template: PubSubTopicSpec {
                resource_id: Some(value("{{ .metadata.namespace }}-{{ .metadata.name }}", "payments-orders")),
                kms_key_ref: Some(ResourceRef::named(value(
                    "{{ .metadata.labels.team | lower }}-key",
                    "payments-key",
                ))),
                message_retention_duration: Some("86400s".to_string()),
                message_storage_policy: Some(TopicMessageStoragePolicy {
                    allowed_persistence_regions: vec![
                        value("{{ .metadata.labels.region }}", "europe-west1"),
                        "europe-west4".to_string(),
                    ],
                }),
                ..Default::default()
            },
        },
    );
    template.metadata.namespace = Some("payments".to_string());
    template.metadata.labels = Some(BTreeMap::from([
        ("team".to_string(), "Payments".to_string()),
        ("region".to_string(), "europe-west1".to_string()),
    ]));
    template
}

/// A flat object with `size` string fields, every other one templated
fn wide_object(size: usize) -> JsonValue {
    let mut fields = Map::new();
    for i in 0..size {
        let value = if i % 2 == 0 {
            format!("{{{{ .metadata.name }}}}-{i}")
        } else {
            format!("literal-{i}")
        };
        fields.insert(format!("field{i}"), JsonValue::String(value));
    }
    JsonValue::Object(fields)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_expand_spec(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_spec");
    let engine = TemplateEngine::new();

    for (label, templated) in [("literal", false), ("templated", true)] {
        let template = labelled_template(templated);
        let ctx = TemplateContext::from_resource(&template).expect("context");
        group.throughput(Throughput::Elements(1));
        group.bench_function(label, |b| {
            b.iter(|| expand(&engine, black_box(&template.spec.template), &ctx).expect("expand"));
        });
    }

    group.finish();
}

fn bench_expand_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_wide");
    let engine = TemplateEngine::new();
    let ctx = TemplateContext::from_json(json!({"metadata": {"name": "orders"}})).expect("context");

    for size in [10usize, 100, 1000] {
        let object = wide_object(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &object, |b, object| {
            b.iter(|| expand_json(&engine, black_box(object), &ctx).expect("expand"));
        });
    }

    group.finish();
}

fn bench_converged_pass(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let templates = Arc::new(MemoryStore::<PubSubTopicTemplate>::new());
    let targets = Arc::new(MemoryStore::<PubSubTopic>::new());
    let reconciler: Reconciler<PubSubTopicTemplate> =
        Reconciler::new(templates.clone(), targets.clone());

    templates.insert(labelled_template(true));
    runtime.block_on(async {
        while reconciler
            .reconcile("payments", "orders")
            .await
            .expect("converge")
            .requeue
        {}
    });

    c.bench_function("converged_pass", |b| {
        b.iter(|| {
            runtime
                .block_on(reconciler.reconcile(black_box("payments"), "orders"))
                .expect("pass")
        });
    });
}

criterion_group!(benches, bench_expand_spec, bench_expand_wide, bench_converged_pass);
criterion_main!(benches);
