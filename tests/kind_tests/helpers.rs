//! Test helpers for integration tests
//!
//! Provides utilities for managing the kind cluster, CRDs and namespaces.

use std::future::Future;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Config};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use templater::crd;

/// Name of the kind cluster used for integration tests
pub const TEST_CLUSTER_NAME: &str = "templater-integration-test";

/// Field manager used when the tests apply CRDs
const TEST_FIELD_MANAGER: &str = "templater-tests";

/// Global lock to ensure cluster is created only once
static CLUSTER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Track if CRDs have been installed (async-safe)
static CRDS_INSTALLED: OnceCell<Result<(), String>> = OnceCell::const_new();

/// Check if a kind cluster with the given name exists
pub fn kind_cluster_exists(name: &str) -> bool {
    let Ok(output) = Command::new("kind").args(["get", "clusters"]).output() else {
        return false;
    };

    let clusters = String::from_utf8_lossy(&output.stdout);
    clusters.lines().any(|line| line.trim() == name)
}

/// Create a kind cluster for testing
pub fn create_kind_cluster(name: &str) -> Result<(), String> {
    if kind_cluster_exists(name) {
        println!("Kind cluster '{name}' already exists, reusing it");
        return Ok(());
    }

    println!("Creating kind cluster '{name}'...");
    let output = Command::new("kind")
        .args(["create", "cluster", "--name", name, "--wait", "60s"])
        .output()
        .map_err(|e| format!("failed to run kind: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "failed to create kind cluster: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    println!("Kind cluster '{name}' created successfully");
    Ok(())
}

/// Apply the template CRDs and the stand-in target CRDs
pub async fn install_crds(client: &Client) -> Result<(), kube::Error> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(TEST_FIELD_MANAGER).force();

    for crd in crd::template_crds().into_iter().chain(crd::target_crds()) {
        let name = crd.metadata.name.clone().unwrap_or_default();
        println!("Applying CRD {name}...");
        crds.patch(&name, &params, &Patch::Apply(&crd)).await?;
    }

    // Wait for CRDs to be established
    sleep(Duration::from_secs(2)).await;

    println!("CRDs installed successfully");
    Ok(())
}

/// Create a Kubernetes client connected to the test cluster
pub async fn create_test_client() -> Result<Client, String> {
    let context_name = format!("kind-{TEST_CLUSTER_NAME}");

    let config = Config::from_kubeconfig(&kube::config::KubeConfigOptions {
        context: Some(context_name),
        ..Default::default()
    })
    .await
    .map_err(|e| format!("failed to load kubeconfig: {e}"))?;

    Client::try_from(config).map_err(|e| format!("failed to create client: {e}"))
}

/// Ensure the test cluster is ready (thread-safe, cluster created once)
///
/// Returns a fresh Client for each call - clients should not be shared across test threads.
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let cluster_result = CLUSTER_INIT.get_or_init(|| create_kind_cluster(TEST_CLUSTER_NAME));
    cluster_result.clone()?;

    let client = create_test_client().await?;

    let crd_result = CRDS_INSTALLED
        .get_or_init(|| async {
            let client = create_test_client().await?;
            install_crds(&client)
                .await
                .map_err(|e| format!("failed to install CRDs: {e}"))
        })
        .await;
    crd_result.clone()?;

    Ok(client)
}

/// Create a fresh namespace for one test, deleting any leftover from a
/// previous run
pub async fn fresh_namespace(client: &Client, name: &str) -> Result<(), kube::Error> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    if namespaces.get_opt(name).await?.is_some() {
        namespaces.delete(name, &DeleteParams::default()).await?;
        let namespaces = &namespaces;
        wait_for(Duration::from_secs(60), || async move {
            matches!(namespaces.get_opt(name).await, Ok(None))
        })
        .await;
    }

    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    namespaces.create(&PostParams::default(), &namespace).await?;
    Ok(())
}

/// Poll `check` every 500ms until it returns true or `timeout` passes
///
/// Returns whether the condition was met.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(500)).await;
    }
    false
}
