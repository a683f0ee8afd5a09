//! ArborCluster Custom Resource Definition
//!
//! An ArborCluster describes a workload cluster hosted on an Arbor fleet:
//! the Vantage control plane it is attached to, the shared credential and
//! trust bundle objects it references, and the failure domains its machines
//! may be placed into. The controller projects the spec into status and
//! keeps the shared references' ownership bookkeeping up to date.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    Condition, ControlPlaneEndpoint, CredentialReference, FailureDomainSpec, TrustBundleReference,
    VantageEndpoint,
};

/// Specification for an ArborCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.arbor.dev",
    version = "v1alpha1",
    kind = "ArborCluster",
    plural = "arborclusters",
    shortname = "arbc",
    status = "ArborClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".spec.controlPlaneEndpoint.host"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ArborClusterSpec {
    /// Endpoint of the workload cluster's API server once provisioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ControlPlaneEndpoint>,

    /// Vantage control plane this cluster's infrastructure lives on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vantage_endpoint: Option<VantageEndpoint>,

    /// Failure domains machines may be placed into, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_domains: Vec<FailureDomainSpec>,
}

impl ArborClusterSpec {
    /// The credential reference, if a Vantage endpoint declares one
    pub fn credential_ref(&self) -> Option<&CredentialReference> {
        self.vantage_endpoint.as_ref()?.credential_ref.as_ref()
    }

    /// The trust bundle reference, if a Vantage endpoint declares one
    pub fn trust_bundle_ref(&self) -> Option<&TrustBundleReference> {
        self.vantage_endpoint.as_ref()?.trust_bundle_ref.as_ref()
    }

    /// Validate the cluster specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(endpoint) = &self.vantage_endpoint {
            endpoint.validate()?;
        }

        let mut seen = std::collections::BTreeSet::new();
        for fd in &self.failure_domains {
            fd.validate()?;
            if !seen.insert(fd.name.as_str()) {
                return Err(crate::Error::validation(format!(
                    "duplicate failure domain name: {}",
                    fd.name
                )));
            }
        }

        Ok(())
    }
}

/// Status of one failure domain projected from the spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomainStatus {
    /// Whether control plane machines may be placed in this failure domain
    #[serde(default)]
    pub control_plane: bool,
}

/// Status for an ArborCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArborClusterStatus {
    /// Whether the cluster infrastructure is ready for machine placement
    #[serde(default)]
    pub ready: bool,

    /// Failure domains available for placement, keyed by name.
    ///
    /// Key set equals the spec's declared names whenever the
    /// FailureDomainsReconciled condition is true; empty whenever the spec
    /// declares none.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_domains: BTreeMap<String, FailureDomainStatus>,

    /// Conditions representing the reconciliation state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Machine-readable terminal failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Terminal failure message. Once set, normal reconciliation halts
    /// until an operator clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl ArborClusterStatus {
    /// Set the ready flag and return self for chaining
    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    /// Add a condition and return self for chaining
    ///
    /// An existing condition of the same type is replaced. Its transition
    /// time is carried over when the status did not change, keeping
    /// repeated projections of an unchanged spec byte-identical.
    pub fn condition(mut self, mut condition: Condition) -> Self {
        if let Some(idx) = self
            .conditions
            .iter()
            .position(|c| c.type_ == condition.type_)
        {
            let previous = self.conditions.remove(idx);
            if previous.status == condition.status {
                condition.last_transition_time = previous.last_transition_time;
            }
        }
        self.conditions.push(condition);
        self
    }

    /// Drop any condition of the given type and return self for chaining
    pub fn without_condition(mut self, type_: &str) -> Self {
        self.conditions.retain(|c| c.type_ != type_);
        self
    }

    /// Record a terminal failure and return self for chaining
    pub fn failure(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self.failure_message = Some(message.into());
        self
    }

    /// Look up a condition by type
    pub fn find_condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl ArborCluster {
    /// Whether the cluster infrastructure has been marked ready
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }

    /// Whether a terminal failure has been recorded on the cluster
    pub fn has_terminal_failure(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.failure_message.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::types::{
        ConditionStatus, IdentifierKind, ResourceIdentifier, TrustBundleKind,
        CONDITION_FAILURE_DOMAINS_RECONCILED, CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
    };
    use chrono::{DateTime, Utc};

    // =========================================================================
    // Test Fixtures
    // =========================================================================

    fn sample_failure_domain(name: &str, control_plane: bool) -> FailureDomainSpec {
        FailureDomainSpec {
            name: name.to_string(),
            cluster: ResourceIdentifier::uuid("c1a2b3c4-0000-0000-0000-000000000001"),
            subnets: vec![ResourceIdentifier::named("tenant-net")],
            control_plane,
        }
    }

    fn sample_endpoint() -> VantageEndpoint {
        VantageEndpoint {
            address: "vantage.arbor.example".to_string(),
            port: 9443,
            insecure: false,
            credential_ref: Some(CredentialReference {
                name: "vantage-creds".to_string(),
                namespace: Some("arbor-system".to_string()),
            }),
            trust_bundle_ref: None,
        }
    }

    fn sample_spec() -> ArborClusterSpec {
        ArborClusterSpec {
            control_plane_endpoint: Some(ControlPlaneEndpoint {
                host: "10.0.0.10".to_string(),
                port: 6443,
            }),
            vantage_endpoint: Some(sample_endpoint()),
            failure_domains: vec![
                sample_failure_domain("rack-1", true),
                sample_failure_domain("rack-2", false),
            ],
        }
    }

    // =========================================================================
    // Validation Stories
    // =========================================================================

    /// Story: A complete cluster spec passes validation
    #[test]
    fn story_valid_spec_passes_validation() {
        assert!(sample_spec().validate().is_ok());
    }

    /// Story: Duplicate failure domain names are rejected
    ///
    /// status.failureDomains is keyed by name, so duplicate declarations
    /// would silently collapse into one entry.
    #[test]
    fn story_duplicate_failure_domain_names_fail_validation() {
        let mut spec = sample_spec();
        spec.failure_domains
            .push(sample_failure_domain("rack-1", false));
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate failure domain name"));
    }

    /// Story: A declared endpoint must carry an address
    #[test]
    fn story_endpoint_without_address_fails_validation() {
        let mut spec = sample_spec();
        if let Some(endpoint) = spec.vantage_endpoint.as_mut() {
            endpoint.address.clear();
        }
        assert!(spec.validate().is_err());
    }

    /// Story: A malformed trust bundle is caught at validation time
    #[test]
    fn story_inline_trust_bundle_without_data_fails_validation() {
        let mut spec = sample_spec();
        if let Some(endpoint) = spec.vantage_endpoint.as_mut() {
            endpoint.trust_bundle_ref = Some(TrustBundleReference {
                kind: TrustBundleKind::String,
                data: None,
                name: None,
                namespace: None,
            });
        }
        assert!(spec.validate().is_err());
    }

    // =========================================================================
    // Reference Accessor Tests
    // =========================================================================

    #[test]
    fn credential_ref_requires_a_declared_endpoint() {
        let spec = ArborClusterSpec::default();
        assert!(spec.credential_ref().is_none());

        let spec = sample_spec();
        assert_eq!(
            spec.credential_ref().map(|r| r.name.as_str()),
            Some("vantage-creds")
        );
    }

    #[test]
    fn trust_bundle_ref_follows_the_endpoint() {
        let mut spec = sample_spec();
        assert!(spec.trust_bundle_ref().is_none());

        if let Some(endpoint) = spec.vantage_endpoint.as_mut() {
            endpoint.trust_bundle_ref = Some(TrustBundleReference {
                kind: TrustBundleKind::ConfigMap,
                data: None,
                name: Some("vantage-ca".to_string()),
                namespace: None,
            });
        }
        assert_eq!(
            spec.trust_bundle_ref().map(|r| r.kind),
            Some(TrustBundleKind::ConfigMap)
        );
    }

    // =========================================================================
    // Status Builder Stories
    // =========================================================================

    /// Story: Controller builds complete status during reconciliation
    #[test]
    fn story_controller_builds_complete_status_fluently() {
        let status = ArborClusterStatus::default().ready(true).condition(Condition::new(
            CONDITION_FAILURE_DOMAINS_RECONCILED,
            ConditionStatus::True,
            "Reconciled",
            "2 failure domains configured",
        ));

        assert!(status.ready);
        assert_eq!(status.conditions.len(), 1);
        assert!(status
            .find_condition(CONDITION_FAILURE_DOMAINS_RECONCILED)
            .is_some());
    }

    /// Story: Adding a condition with the same type replaces the old one
    #[test]
    fn story_new_condition_replaces_old_condition_of_same_type() {
        let status = ArborClusterStatus::default()
            .condition(Condition::new(
                CONDITION_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::False,
                "Projecting",
                "projection in progress",
            ))
            .condition(Condition::new(
                CONDITION_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::True,
                "Reconciled",
                "2 failure domains configured",
            ));

        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, ConditionStatus::True);
        assert_eq!(status.conditions[0].reason, "Reconciled");
    }

    /// Story: An unchanged condition keeps its transition time
    ///
    /// Re-running the projection with an unchanged spec must produce
    /// byte-identical status, so a condition that did not flip keeps the
    /// timestamp of its original transition.
    #[test]
    fn story_unchanged_condition_keeps_its_transition_time() {
        let t0: DateTime<Utc> = "2024-03-01T00:00:00Z".parse().unwrap();
        let mut first = Condition::new(
            CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
            ConditionStatus::True,
            "NoFailureDomains",
            "no failure domains declared in spec",
        );
        first.last_transition_time = t0;

        let status = ArborClusterStatus::default().condition(first).condition(Condition::new(
            CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
            ConditionStatus::True,
            "NoFailureDomains",
            "no failure domains declared in spec",
        ));

        assert_eq!(status.conditions[0].last_transition_time, t0);

        // A flipped status starts a new transition.
        let flipped = status.condition(Condition::new(
            CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
            ConditionStatus::False,
            "FailureDomainsAdded",
            "spec now declares failure domains",
        ));
        assert_ne!(flipped.conditions[0].last_transition_time, t0);
    }

    /// Story: Clearing a condition removes only that type
    #[test]
    fn story_without_condition_removes_only_the_named_type() {
        let status = ArborClusterStatus::default()
            .condition(Condition::new(
                CONDITION_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::True,
                "Reconciled",
                "1 failure domain configured",
            ))
            .condition(Condition::new(
                CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::True,
                "NoFailureDomains",
                "stale",
            ))
            .without_condition(CONDITION_NO_FAILURE_DOMAINS_RECONCILED);

        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].type_, CONDITION_FAILURE_DOMAINS_RECONCILED);
    }

    /// Story: A terminal failure latches both reason and message
    #[test]
    fn story_terminal_failure_latches_reason_and_message() {
        let status =
            ArborClusterStatus::default().failure("HostClusterGone", "host cluster was removed");

        assert_eq!(status.failure_reason.as_deref(), Some("HostClusterGone"));
        assert_eq!(
            status.failure_message.as_deref(),
            Some("host cluster was removed")
        );

        let cluster = ArborCluster::new("doomed", ArborClusterSpec::default());
        assert!(!cluster.has_terminal_failure());
        let cluster = ArborCluster {
            status: Some(status),
            ..cluster
        };
        assert!(cluster.has_terminal_failure());
    }

    // =========================================================================
    // Serialization Stories
    // =========================================================================

    /// Story: User defines a cluster in a YAML manifest
    #[test]
    fn story_yaml_manifest_defines_cluster() {
        let yaml = r#"
controlPlaneEndpoint:
  host: "10.0.0.10"
  port: 6443
vantageEndpoint:
  address: vantage.arbor.example
  credentialRef:
    name: vantage-creds
    namespace: arbor-system
  trustBundleRef:
    kind: ConfigMap
    name: vantage-ca
failureDomains:
  - name: rack-1
    cluster:
      type: uuid
      uuid: c1a2b3c4-0000-0000-0000-000000000001
    subnets:
      - type: name
        name: tenant-net
    controlPlane: true
"#;
        let spec: ArborClusterSpec = serde_yaml::from_str(yaml).unwrap();

        assert!(spec.validate().is_ok());
        assert_eq!(spec.failure_domains.len(), 1);
        assert!(spec.failure_domains[0].control_plane);
        assert_eq!(
            spec.failure_domains[0].cluster.kind,
            IdentifierKind::Uuid
        );
        assert_eq!(
            spec.vantage_endpoint.as_ref().map(|e| e.port),
            Some(9443),
            "port falls back to the default when omitted"
        );
        assert_eq!(
            spec.trust_bundle_ref().and_then(|r| r.name.as_deref()),
            Some("vantage-ca")
        );
    }

    /// Story: Spec survives a serialization roundtrip
    #[test]
    fn story_spec_survives_json_roundtrip() {
        let spec = sample_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: ArborClusterSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, parsed);
    }

    /// Story: Status omits empty collections on the wire
    #[test]
    fn story_status_wire_form_omits_empty_collections() {
        let json = serde_json::to_value(ArborClusterStatus::default()).unwrap();
        assert_eq!(json["ready"], false);
        assert!(json.get("failureDomains").is_none());
        assert!(json.get("conditions").is_none());
        assert!(json.get("failureMessage").is_none());
    }
}
