//! ArborCluster reconciler
//!
//! Drives an ArborCluster from creation to readiness and back out through
//! deletion. The normal path latches terminal failures, short-circuits
//! ready clusters into a pure status projection, and otherwise ensures the
//! primary finalizer, claims the shared credential and trust bundle
//! objects, and persists a ready status. The delete path releases the
//! shared claims before letting go of the primary finalizer.
//!
//! All store access goes through the [`KubeClient`] trait so the
//! reconciler can be exercised against mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Api, Client, ResourceExt};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info, instrument, warn};

use arbor_common::crd::{ArborCluster, ArborClusterStatus};
use arbor_common::{Error, Result, ARBORCLUSTER_FINALIZER};

use super::ownership::{
    reconcile_credential_ref, reconcile_credential_ref_delete, reconcile_trust_bundle_ref,
    reconcile_trust_bundle_ref_delete,
};
use super::status::reconcile_failure_domains;

/// Store operations the reconciler issues
///
/// A thin seam over the Kubernetes API. `get_*` return `Ok(None)` for
/// NotFound so callers can tell an absent object from a failed request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch a Secret, `Ok(None)` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Write back a mutated Secret
    async fn update_secret(&self, secret: &Secret) -> Result<()>;

    /// Fetch a ConfigMap, `Ok(None)` when it does not exist
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    /// Write back a mutated ConfigMap
    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<()>;

    /// Write back a mutated ArborCluster (finalizer changes)
    async fn update_arbor_cluster(&self, cluster: &ArborCluster) -> Result<()>;

    /// Write an ArborCluster's status through the status subresource
    async fn update_arbor_cluster_status(
        &self,
        cluster: &ArborCluster,
        status: &ArborClusterStatus,
    ) -> Result<()>;
}

/// Production [`KubeClient`] backed by a kube [`Client`]
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new client wrapper
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_secret(&self, secret: &Secret) -> Result<()> {
        let namespace = secret.namespace().unwrap_or_default();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&secret.name_any(), &PostParams::default(), secret)
            .await?;
        Ok(())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(config_map) => Ok(Some(config_map)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_config_map(&self, config_map: &ConfigMap) -> Result<()> {
        let namespace = config_map.namespace().unwrap_or_default();
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&config_map.name_any(), &PostParams::default(), config_map)
            .await?;
        Ok(())
    }

    async fn update_arbor_cluster(&self, cluster: &ArborCluster) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();
        let api: Api<ArborCluster> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&cluster.name_any(), &PostParams::default(), cluster)
            .await?;
        Ok(())
    }

    async fn update_arbor_cluster_status(
        &self,
        cluster: &ArborCluster,
        status: &ArborClusterStatus,
    ) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();
        let api: Api<ArborCluster> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(
            &cluster.name_any(),
            &PatchParams::apply("arbor-controller"),
            &Patch::Merge(&serde_json::json!({ "status": status })),
        )
        .await?;
        Ok(())
    }
}

/// Shared state passed to every reconcile invocation
#[derive(Clone)]
pub struct Context {
    /// Store access for the reconciler and the ownership paths
    pub kube: Arc<dyn KubeClient>,
}

impl Context {
    /// Start building a context from a kube client
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Build a context around a mock store
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self { kube }
    }
}

/// Builder for [`Context`], allowing store injection
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self { client, kube: None }
    }

    /// Override the store client
    pub fn kube(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Finalize the context, defaulting to the production store client
    pub fn build(self) -> Context {
        Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(self.client.clone()))),
        }
    }
}

/// Reconcile one ArborCluster
///
/// Entry point handed to the controller runtime. Routes to the delete path
/// when the resource is marked for deletion, the normal path otherwise.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<ArborCluster>, ctx: Arc<Context>) -> Result<Action> {
    if cluster.metadata.deletion_timestamp.is_some() {
        debug!("cluster is marked for deletion");
        reconcile_delete(&cluster, &ctx).await
    } else {
        reconcile_normal(&cluster, &ctx).await
    }
}

async fn reconcile_normal(cluster: &ArborCluster, ctx: &Context) -> Result<Action> {
    // Terminal failure latch: an operator has to clear failure_message
    // before reconciliation resumes.
    if cluster.has_terminal_failure() {
        warn!("cluster carries a terminal failure, reconciliation is halted");
        return Ok(Action::await_change());
    }

    // Steady state: only the projection may drift after readiness.
    if cluster.is_ready() {
        let status = reconcile_failure_domains(cluster);
        persist_status(cluster, ctx, &status).await?;
        return Ok(Action::await_change());
    }

    if let Err(err) = cluster.spec.validate() {
        warn!(%err, "cluster spec failed validation, latching terminal failure");
        let status = cluster
            .status
            .clone()
            .unwrap_or_default()
            .failure("InvalidSpec", err.to_string());
        persist_status(cluster, ctx, &status).await?;
        return Ok(Action::await_change());
    }

    ensure_finalizer(cluster, ctx).await?;

    let status = reconcile_failure_domains(cluster);

    reconcile_credential_ref(cluster, ctx).await?;
    reconcile_trust_bundle_ref(cluster, ctx).await?;

    let status = status.ready(true);
    persist_status(cluster, ctx, &status).await?;

    info!("cluster infrastructure is ready");
    Ok(Action::await_change())
}

async fn reconcile_delete(cluster: &ArborCluster, ctx: &Context) -> Result<Action> {
    reconcile_trust_bundle_ref_delete(cluster, ctx).await?;
    reconcile_credential_ref_delete(cluster, ctx).await?;

    // Both releases have landed, the primary may now be let go.
    if cluster
        .finalizers()
        .iter()
        .any(|f| f == ARBORCLUSTER_FINALIZER)
    {
        let mut updated = cluster.clone();
        if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != ARBORCLUSTER_FINALIZER);
        }
        info!("removing cluster finalizer");
        ctx.kube.update_arbor_cluster(&updated).await?;
    }

    Ok(Action::await_change())
}

async fn ensure_finalizer(cluster: &ArborCluster, ctx: &Context) -> Result<()> {
    if cluster
        .finalizers()
        .iter()
        .any(|f| f == ARBORCLUSTER_FINALIZER)
    {
        return Ok(());
    }

    let mut updated = cluster.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(ARBORCLUSTER_FINALIZER.to_string());
    info!("adding cluster finalizer");
    ctx.kube.update_arbor_cluster(&updated).await
}

async fn persist_status(
    cluster: &ArborCluster,
    ctx: &Context,
    status: &ArborClusterStatus,
) -> Result<()> {
    if cluster.status.as_ref() == Some(status) {
        debug!("status is unchanged, skipping write");
        return Ok(());
    }
    ctx.kube.update_arbor_cluster_status(cluster, status).await
}

/// Decide what to do when reconciliation fails
///
/// Everything requeues after a fixed back-off. Non-retryable errors still
/// requeue: the user fixing the spec or creating the missing reference is
/// exactly the change the retry is waiting to observe.
pub fn error_policy(cluster: Arc<ArborCluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(?error, cluster = %cluster.name_any(), "reconciliation failed");
    Action::requeue(Duration::from_secs(5))
}
