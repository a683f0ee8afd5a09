//! Failure domain projection for ArborCluster status
//!
//! The spec's failure domain list is projected into `status.failure_domains`
//! together with a condition describing the outcome. The projection is pure:
//! no store reads, deterministic output, and byte-identical results when the
//! spec has not changed (unchanged conditions keep their transition time).

use arbor_common::crd::{
    ArborCluster, ArborClusterStatus, Condition, ConditionStatus, FailureDomainStatus,
    CONDITION_FAILURE_DOMAINS_RECONCILED, CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
};
use tracing::debug;

/// Project the spec's failure domains into a new status.
///
/// Starts from the cluster's observed status so unrelated fields (ready
/// flag, other conditions, failure latch) carry through untouched. The two
/// projection conditions are mutually exclusive; whichever does not apply is
/// removed.
pub fn reconcile_failure_domains(cluster: &ArborCluster) -> ArborClusterStatus {
    let status = cluster.status.clone().unwrap_or_default();

    if cluster.spec.failure_domains.is_empty() {
        debug!("spec declares no failure domains");
        let mut status = status
            .without_condition(CONDITION_FAILURE_DOMAINS_RECONCILED)
            .condition(Condition::new(
                CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::True,
                "NoFailureDomains",
                "no failure domains declared in spec",
            ));
        status.failure_domains.clear();
        return status;
    }

    let failure_domains = cluster
        .spec
        .failure_domains
        .iter()
        .map(|fd| {
            (
                fd.name.clone(),
                FailureDomainStatus {
                    control_plane: fd.control_plane,
                },
            )
        })
        .collect();

    debug!(
        count = cluster.spec.failure_domains.len(),
        "projecting failure domains into status"
    );
    let mut status = status
        .without_condition(CONDITION_NO_FAILURE_DOMAINS_RECONCILED)
        .condition(Condition::new(
            CONDITION_FAILURE_DOMAINS_RECONCILED,
            ConditionStatus::True,
            "Reconciled",
            format!(
                "{} failure domains configured",
                cluster.spec.failure_domains.len()
            ),
        ));
    status.failure_domains = failure_domains;
    status
}
