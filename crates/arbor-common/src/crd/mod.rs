//! Custom Resource Definitions for the Arbor cluster controller
//!
//! This module contains the ArborCluster CRD and the shared spec/status
//! types it is built from.

mod cluster;
mod types;

pub use cluster::{ArborCluster, ArborClusterSpec, ArborClusterStatus, FailureDomainStatus};
pub use types::{
    Condition, ConditionStatus, ControlPlaneEndpoint, CredentialReference, FailureDomainSpec,
    IdentifierKind, ResourceIdentifier, TrustBundleKind, TrustBundleReference, VantageEndpoint,
    CONDITION_FAILURE_DOMAINS_RECONCILED, CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
};

// =============================================================================

/// Validate a DNS-style identifier (lowercase alphanumeric with hyphens).
///
/// Rules:
/// - Must not be empty
/// - Must start with a lowercase letter
/// - May contain lowercase letters, digits, and hyphens
/// - Must not end with a hyphen
///
/// Used for failure domain names.
pub(crate) fn validate_dns_identifier(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("identifier cannot be empty".to_string());
    }

    let mut chars = s.chars();

    // First char must be a lowercase letter
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => {
            return Err(format!(
                "identifier must start with lowercase letter: {}",
                s
            ))
        }
    }

    // Rest must be lowercase alphanumeric or hyphen
    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return Err(format!(
                "identifier must be lowercase alphanumeric with hyphens: {}",
                s
            ));
        }
    }

    if s.ends_with('-') {
        return Err(format!("identifier cannot end with hyphen: {}", s));
    }

    Ok(())
}
