//! Arbor Operator - Kubernetes controller for Arbor-hosted cluster infrastructure

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arbor_common::crd::ArborCluster;
use arbor_operator::controller::{error_policy, reconcile, Context};

/// Arbor - CRD-driven Kubernetes operator for cluster infrastructure
#[derive(Parser, Debug)]
#[command(name = "arbor-operator", version, about, long_about = None)]
struct Cli {
    /// Generate the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Upper bound on reconciles the scheduler may run at once
    #[arg(long, env = "ARBOR_MAX_CONCURRENT_RECONCILES", default_value_t = 1)]
    max_concurrent_reconciles: usize,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&ArborCluster::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    if cli.max_concurrent_reconciles == 0 {
        anyhow::bail!("--max-concurrent-reconciles must be at least 1");
    }

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.max_concurrent_reconciles).await,
    }
}

/// Ensure the ArborCluster CRD is installed and established
///
/// The operator installs its own CRD on startup using server-side apply,
/// so the CRD version always matches the operator version.
async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};
    use kube::runtime::wait::{await_condition, conditions};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply("arbor-controller").force();

    tracing::info!("Installing ArborCluster CRD...");
    crds.patch(
        "arborclusters.infrastructure.arbor.dev",
        &params,
        &Patch::Apply(&ArborCluster::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install ArborCluster CRD: {}", e))?;

    // Wait until the api-server accepts and establishes the CRD; watches
    // started before that would miss the resource type.
    let establish = await_condition(
        crds.clone(),
        "arborclusters.infrastructure.arbor.dev",
        conditions::is_crd_established(),
    );
    let _ = tokio::time::timeout(Duration::from_secs(20), establish)
        .await
        .map_err(|_| anyhow::anyhow!("Timed out waiting for the ArborCluster CRD to be established"))?;

    tracing::info!("ArborCluster CRD installed and established");
    Ok(())
}

/// Run in controller mode - reconciles ArborCluster resources
async fn run_controller(max_concurrent_reconciles: usize) -> anyhow::Result<()> {
    tracing::info!("Arbor controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crd_installed(&client).await?;

    let ctx = Arc::new(Context::builder(client.clone()).build());
    let clusters: Api<ArborCluster> = Api::all(client);

    // The runtime serializes per cluster on its own; the knob records
    // operator intent until the scheduler exposes a bound for it.
    tracing::info!(max_concurrent_reconciles, "Starting ArborCluster controller");

    Controller::new(clusters, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "Cluster reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Cluster reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("Arbor controller shutting down");
    Ok(())
}
