//! Templater operator - renders templated Config Connector resources

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::Value as JsonValue;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use templater::controller::{self, preview_target, ControllerConfig};
use templater::crd::{self, PubSubSubscriptionTemplate, PubSubTopicTemplate, Templated};
use templater::retry::{retry_if, RetryConfig};
use templater::template::TemplateEngine;
use templater::FIELD_MANAGER;

/// Templater - keeps Config Connector resources in sync with their templates
#[derive(Parser, Debug)]
#[command(name = "templater", version, about, long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "TEMPLATER_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print CRD manifests and exit
    Crd {
        /// Also print stand-in CRDs for the Config Connector target kinds
        ///
        /// Only for clusters without Config Connector, such as test clusters.
        #[arg(long)]
        with_targets: bool,
    },

    /// Run the controllers (default mode)
    ///
    /// One controller per template kind watches its templates and the
    /// targets they own, creating and updating targets as templates change.
    Controller,

    /// Render a template manifest offline and print the resulting target
    Render {
        /// Path to a YAML file with one or more template manifests
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
    },
}

/// Controller mode arguments
#[derive(Args, Debug)]
struct ControllerArgs {
    /// Only watch templates in this namespace (default: all namespaces)
    #[arg(long, env = "TEMPLATER_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Seconds to wait before the pass following a target creation
    #[arg(long, default_value = "1", env = "TEMPLATER_REQUEUE_AFTER_CREATE_SECS", global = true)]
    requeue_after_create_secs: u64,

    /// Seconds to wait before retrying a pass that hit a store error
    #[arg(long, default_value = "5", env = "TEMPLATER_ERROR_REQUEUE_SECS", global = true)]
    error_requeue_secs: u64,

    /// Server-side apply the template CRDs before starting
    #[arg(long, env = "TEMPLATER_INSTALL_CRDS", global = true)]
    install_crds: bool,
}

impl ControllerArgs {
    fn config(&self) -> ControllerConfig {
        ControllerConfig {
            namespace: self.namespace.clone(),
            requeue_after_create: Duration::from_secs(self.requeue_after_create_secs),
            error_requeue: Duration::from_secs(self.error_requeue_secs),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Some(Commands::Crd { with_targets }) => print_crds(with_targets),
        Some(Commands::Render { file }) => render_file(&file).await,
        Some(Commands::Controller) | None => run_controllers(&cli.controller).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

fn crds(with_targets: bool) -> Vec<CustomResourceDefinition> {
    let mut crds = crd::template_crds();
    if with_targets {
        crds.extend(crd::target_crds());
    }
    crds
}

fn print_crds(with_targets: bool) -> anyhow::Result<()> {
    let docs = crds(with_targets)
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
    println!("{}", docs.join("---\n"));
    Ok(())
}

/// Run every template controller until a shutdown signal
async fn run_controllers(args: &ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.install_crds {
        install_crds(&client).await?;
    }

    let config = args.config();
    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("*"),
        requeue_after_create_secs = args.requeue_after_create_secs,
        error_requeue_secs = args.error_requeue_secs,
        "starting templater controllers"
    );

    tokio::join!(
        controller::run::<PubSubTopicTemplate>(client.clone(), config.clone()),
        controller::run::<PubSubSubscriptionTemplate>(client, config),
    );

    tracing::info!("all controllers stopped");
    Ok(())
}

/// Server-side apply the template CRDs, retrying while the API server is
/// unavailable
async fn install_crds(client: &Client) -> anyhow::Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let retry = RetryConfig::with_max_attempts(10);

    for crd in crd::template_crds() {
        let name = crd
            .metadata
            .name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("CRD has no name"))?;

        tracing::info!(crd = %name, "installing CRD");
        let patch = Patch::Apply(&crd);
        retry_if(
            &retry,
            "install crd",
            || api.patch(&name, &params, &patch),
            is_transient,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install CRD {}: {}", name, e))?;
    }

    tracing::info!("all templater CRDs installed/updated");
    Ok(())
}

/// Server errors, throttling and connection failures are worth retrying;
/// other client errors (bad request, forbidden) are not
fn is_transient(e: &kube::Error) -> bool {
    match e {
        kube::Error::Api(resp) => resp.code >= 500 || resp.code == 429 || resp.code == 409,
        _ => true,
    }
}

/// Render every template in a YAML file and print the targets
async fn render_file(path: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", path, e))?;

    let engine = TemplateEngine::new();
    let mut rendered = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = <JsonValue as serde::Deserialize>::deserialize(document)
            .map_err(|e| anyhow::anyhow!("Failed to parse {:?}: {}", path, e))?;
        if value.is_null() {
            continue;
        }
        rendered.push(render_document(&engine, value)?);
    }

    println!("{}", rendered.join("---\n"));
    Ok(())
}

fn render_document(engine: &TemplateEngine, value: JsonValue) -> anyhow::Result<String> {
    let kind = value
        .get("kind")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();

    match kind.as_str() {
        "PubSubTopicTemplate" => render_as::<PubSubTopicTemplate>(engine, value),
        "PubSubSubscriptionTemplate" => render_as::<PubSubSubscriptionTemplate>(engine, value),
        other => Err(anyhow::anyhow!("Unsupported template kind {:?}", other)),
    }
}

fn render_as<T: Templated>(engine: &TemplateEngine, value: JsonValue) -> anyhow::Result<String> {
    let template: T = serde_json::from_value(value)
        .map_err(|e| anyhow::anyhow!("Invalid {}: {}", T::CONTROLLER_ID, e))?;
    let target = preview_target(engine, &template)?;
    Ok(serde_yaml::to_string(&target)?)
}
