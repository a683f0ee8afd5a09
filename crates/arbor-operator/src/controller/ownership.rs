//! Shared-resource ownership bookkeeping for ArborCluster
//!
//! A credential Secret or trust bundle ConfigMap may be referenced by many
//! ArborClusters at once. Each owner marks the shared object with its own
//! finalizer token ([`credential_finalizer`]); the token set is the live
//! reference count, and the store keeps the object pinned while any token
//! remains. The add paths claim the object for a cluster, the delete paths
//! release it. Neither path ever deletes the shared object itself.
//!
//! An older scheme used one shared token for every owner
//! ([`DEPRECATED_CREDENTIAL_FINALIZER`]); both paths migrate it away on
//! sight.

use arbor_common::crd::{ArborCluster, TrustBundleKind};
use arbor_common::{credential_finalizer, Error, Result, DEPRECATED_CREDENTIAL_FINALIZER};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use tracing::{debug, info};

use super::cluster::Context;

/// Claim the referenced credential Secret for this cluster.
///
/// No-op without a Vantage endpoint. With an endpoint the credential
/// reference is mandatory and must resolve; a missing reference or a
/// missing Secret is an error the user has to fix. The Secret is updated
/// only when the claim actually changed it.
pub async fn reconcile_credential_ref(cluster: &ArborCluster, ctx: &Context) -> Result<()> {
    let (owner_name, owner_namespace) = owner_identity(cluster)?;

    let Some(endpoint) = cluster.spec.vantage_endpoint.as_ref() else {
        debug!("no vantage endpoint declared, nothing to claim");
        return Ok(());
    };
    let Some(credential_ref) = endpoint.credential_ref.as_ref() else {
        return Err(Error::missing_reference(
            owner_name,
            "Secret",
            "vantage endpoint declared without a credential reference",
        ));
    };

    let namespace = credential_ref
        .namespace
        .as_deref()
        .unwrap_or(owner_namespace);
    let mut secret = ctx
        .kube
        .get_secret(namespace, &credential_ref.name)
        .await?
        .ok_or_else(|| {
            Error::missing_reference(
                owner_name,
                "Secret",
                format!("{}/{} not found", namespace, credential_ref.name),
            )
        })?;

    let token = credential_finalizer(owner_name, owner_namespace);
    if claim_shared_object(&mut secret.metadata, owner_reference(cluster, owner_name), &token) {
        info!(
            secret = %credential_ref.name,
            namespace = %namespace,
            "claiming credential secret"
        );
        ctx.kube.update_secret(&secret).await?;
    } else {
        debug!(secret = %credential_ref.name, "credential secret already claimed");
    }

    Ok(())
}

/// Release this cluster's claim on the referenced credential Secret.
///
/// No-op when no reference is declared or the Secret is already gone.
/// Other owners' tokens are never touched; the Secret is updated only when
/// the release actually changed it, and it is never deleted here.
pub async fn reconcile_credential_ref_delete(cluster: &ArborCluster, ctx: &Context) -> Result<()> {
    let (owner_name, owner_namespace) = owner_identity(cluster)?;

    let Some(credential_ref) = cluster.spec.credential_ref() else {
        debug!("no credential reference declared, nothing to release");
        return Ok(());
    };

    let namespace = credential_ref
        .namespace
        .as_deref()
        .unwrap_or(owner_namespace);
    let Some(mut secret) = ctx.kube.get_secret(namespace, &credential_ref.name).await? else {
        debug!(secret = %credential_ref.name, "credential secret already gone");
        return Ok(());
    };

    let token = credential_finalizer(owner_name, owner_namespace);
    if release_shared_object(&mut secret.metadata, owner_name, &token) {
        info!(
            secret = %credential_ref.name,
            namespace = %namespace,
            "releasing credential secret"
        );
        ctx.kube.update_secret(&secret).await?;
    }

    Ok(())
}

/// Claim the referenced trust bundle ConfigMap for this cluster.
///
/// Inline bundles (kind `String`) involve no store object. A referenced
/// ConfigMap must resolve; the claim mutation is the same one the credential
/// Secret gets.
pub async fn reconcile_trust_bundle_ref(cluster: &ArborCluster, ctx: &Context) -> Result<()> {
    let (owner_name, owner_namespace) = owner_identity(cluster)?;

    let Some(bundle_ref) = cluster.spec.trust_bundle_ref() else {
        return Ok(());
    };
    if bundle_ref.kind == TrustBundleKind::String {
        debug!("trust bundle is inline, no shared object to claim");
        return Ok(());
    }

    let name = bundle_ref.name.as_deref().unwrap_or_default();
    let namespace = bundle_ref.namespace.as_deref().unwrap_or(owner_namespace);
    let mut config_map = ctx
        .kube
        .get_config_map(namespace, name)
        .await?
        .ok_or_else(|| {
            Error::missing_reference(
                owner_name,
                "ConfigMap",
                format!("{namespace}/{name} not found"),
            )
        })?;

    let token = credential_finalizer(owner_name, owner_namespace);
    if claim_shared_object(
        &mut config_map.metadata,
        owner_reference(cluster, owner_name),
        &token,
    ) {
        info!(config_map = %name, namespace = %namespace, "claiming trust bundle config map");
        ctx.kube.update_config_map(&config_map).await?;
    } else {
        debug!(config_map = %name, "trust bundle config map already claimed");
    }

    Ok(())
}

/// Release this cluster's claim on the referenced trust bundle ConfigMap.
///
/// Mirrors the credential release: no-op for inline bundles, absent
/// references, and already-deleted ConfigMaps; update only on mutation; no
/// delete issued.
pub async fn reconcile_trust_bundle_ref_delete(
    cluster: &ArborCluster,
    ctx: &Context,
) -> Result<()> {
    let (owner_name, owner_namespace) = owner_identity(cluster)?;

    let Some(bundle_ref) = cluster.spec.trust_bundle_ref() else {
        return Ok(());
    };
    if bundle_ref.kind == TrustBundleKind::String {
        return Ok(());
    }

    let name = bundle_ref.name.as_deref().unwrap_or_default();
    let namespace = bundle_ref.namespace.as_deref().unwrap_or(owner_namespace);
    let Some(mut config_map) = ctx.kube.get_config_map(namespace, name).await? else {
        debug!(config_map = %name, "trust bundle config map already gone");
        return Ok(());
    };

    let token = credential_finalizer(owner_name, owner_namespace);
    if release_shared_object(&mut config_map.metadata, owner_name, &token) {
        info!(config_map = %name, namespace = %namespace, "releasing trust bundle config map");
        ctx.kube.update_config_map(&config_map).await?;
    }

    Ok(())
}

/// The metadata identity the finalizer token derives from.
///
/// Every ownership operation needs it before touching the store; an object
/// missing either half cannot hold a claim.
fn owner_identity(cluster: &ArborCluster) -> Result<(&str, &str)> {
    let name = cluster.metadata.name.as_deref().filter(|s| !s.is_empty());
    let namespace = cluster
        .metadata
        .namespace
        .as_deref()
        .filter(|s| !s.is_empty());
    match (name, namespace) {
        (Some(name), Some(namespace)) => Ok((name, namespace)),
        _ => Err(Error::validation(
            "cluster has no metadata name or namespace to derive its finalizer token from",
        )),
    }
}

/// Informational owner reference pointing at the claiming cluster.
fn owner_reference(cluster: &ArborCluster, owner_name: &str) -> OwnerReference {
    OwnerReference {
        api_version: ArborCluster::api_version(&()).into_owned(),
        kind: ArborCluster::kind(&()).into_owned(),
        name: owner_name.to_string(),
        uid: cluster.metadata.uid.clone().unwrap_or_default(),
        ..OwnerReference::default()
    }
}

/// Apply the claim mutation to a shared object's metadata.
///
/// Adds the owner token if absent, drops the legacy shared token, and adds
/// the informational owner reference unless the object already carries one
/// of our kind. A same-kind reference naming another cluster blocks the
/// addition: multi-owner objects are tracked by tokens alone. Returns true
/// when anything changed.
fn claim_shared_object(meta: &mut ObjectMeta, owner_ref: OwnerReference, token: &str) -> bool {
    let mut changed = false;

    let finalizers = meta.finalizers.get_or_insert_with(Vec::new);
    if !finalizers.iter().any(|f| f == token) {
        finalizers.push(token.to_string());
        changed = true;
    }
    let before = finalizers.len();
    finalizers.retain(|f| f != DEPRECATED_CREDENTIAL_FINALIZER);
    if finalizers.len() != before {
        changed = true;
    }

    let owner_refs = meta.owner_references.get_or_insert_with(Vec::new);
    if !owner_refs.iter().any(|r| r.kind == owner_ref.kind) {
        owner_refs.push(owner_ref);
        changed = true;
    }

    changed
}

/// Apply the release mutation to a shared object's metadata.
///
/// Removes the owner's token, the legacy shared token if still lingering,
/// and any owner reference naming this cluster. Returns true when anything
/// changed.
fn release_shared_object(meta: &mut ObjectMeta, owner_name: &str, token: &str) -> bool {
    let mut changed = false;

    if let Some(finalizers) = meta.finalizers.as_mut() {
        let before = finalizers.len();
        finalizers.retain(|f| f != token && f != DEPRECATED_CREDENTIAL_FINALIZER);
        if finalizers.len() != before {
            changed = true;
        }
    }

    if let Some(owner_refs) = meta.owner_references.as_mut() {
        let kind = ArborCluster::kind(&());
        let before = owner_refs.len();
        owner_refs.retain(|r| !(r.kind == kind.as_ref() && r.name == owner_name));
        if owner_refs.len() != before {
            changed = true;
        }
    }

    changed
}
