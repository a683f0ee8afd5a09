//! Shared spec and status types for the ArborCluster CRD
//!
//! These types describe how a workload cluster is attached to its Vantage
//! control plane: the gateway endpoint, the shared credential and trust
//! bundle references, and the failure domains machines can be placed into.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type set when the spec's failure domains are projected into status
pub const CONDITION_FAILURE_DOMAINS_RECONCILED: &str = "FailureDomainsReconciled";

/// Condition type set when the spec declares no failure domains
pub const CONDITION_NO_FAILURE_DOMAINS_RECONCILED: &str = "NoFailureDomainsReconciled";

/// Connection details for the Vantage control plane hosting this cluster's
/// infrastructure
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VantageEndpoint {
    /// DNS name or IP address of the Vantage gateway
    pub address: String,

    /// API port on the gateway
    #[serde(default = "default_vantage_port")]
    pub port: u16,

    /// Skip TLS certificate verification when talking to the gateway
    #[serde(default)]
    pub insecure: bool,

    /// Reference to the shared Secret holding Vantage API credentials.
    ///
    /// Required whenever the endpoint itself is declared; reconciliation
    /// reports a missing-reference error otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<CredentialReference>,

    /// Additional CA bundle to trust when verifying the gateway certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_bundle_ref: Option<TrustBundleReference>,
}

fn default_vantage_port() -> u16 {
    9443
}

impl VantageEndpoint {
    /// Validate the endpoint declaration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.address.is_empty() {
            return Err(crate::Error::validation(
                "vantage endpoint address cannot be empty",
            ));
        }
        if let Some(bundle) = &self.trust_bundle_ref {
            bundle.validate()?;
        }
        Ok(())
    }
}

/// Pointer to a shared Secret holding Vantage API credentials
///
/// Several clusters attached to the same Vantage instance typically point
/// at one Secret; ownership of it is tracked with per-cluster finalizer
/// tokens rather than exclusive ownership.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialReference {
    /// Name of the Secret
    pub name: String,

    /// Namespace of the Secret; defaults to the cluster's own namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// How a trust bundle is delivered
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum TrustBundleKind {
    /// PEM data carried inline in the spec
    String,
    /// PEM data held in a shared ConfigMap
    ConfigMap,
}

impl std::fmt::Display for TrustBundleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustBundleKind::String => write!(f, "String"),
            TrustBundleKind::ConfigMap => write!(f, "ConfigMap"),
        }
    }
}

impl std::str::FromStr for TrustBundleKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(TrustBundleKind::String),
            "ConfigMap" => Ok(TrustBundleKind::ConfigMap),
            _ => Err(crate::Error::validation(format!(
                "unknown trust bundle kind: {}",
                s
            ))),
        }
    }
}

/// Reference to an additional CA trust bundle for the Vantage gateway
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrustBundleReference {
    /// Delivery kind: inline PEM string or shared ConfigMap
    pub kind: TrustBundleKind,

    /// Inline PEM data (kind `String`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Name of the ConfigMap (kind `ConfigMap`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace of the ConfigMap; defaults to the cluster's own namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TrustBundleReference {
    /// Validate that the reference matches its kind
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self.kind {
            TrustBundleKind::String => {
                if self.data.as_deref().unwrap_or_default().is_empty() {
                    return Err(crate::Error::validation(
                        "trust bundle of kind String requires inline data",
                    ));
                }
            }
            TrustBundleKind::ConfigMap => {
                if self.name.as_deref().unwrap_or_default().is_empty() {
                    return Err(crate::Error::validation(
                        "trust bundle of kind ConfigMap requires a name",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// How an infrastructure resource is identified on the Vantage side
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// By immutable UUID
    #[default]
    Uuid,
    /// By display name
    Name,
}

/// Identifier of a substrate resource (host cluster, subnet) on the Vantage
/// side
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    /// Whether `uuid` or `name` identifies the resource
    #[serde(rename = "type", default)]
    pub kind: IdentifierKind,

    /// UUID of the resource (kind `uuid`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Display name of the resource (kind `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceIdentifier {
    /// Identifier by UUID
    pub fn uuid(uuid: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Uuid,
            uuid: Some(uuid.into()),
            name: None,
        }
    }

    /// Identifier by display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Name,
            uuid: None,
            name: Some(name.into()),
        }
    }

    /// Validate that the identifier carries the field its kind requires
    pub fn validate(&self) -> Result<(), crate::Error> {
        let value = match self.kind {
            IdentifierKind::Uuid => &self.uuid,
            IdentifierKind::Name => &self.name,
        };
        if value.as_deref().unwrap_or_default().is_empty() {
            return Err(crate::Error::validation(format!(
                "resource identifier of type {:?} is missing its value",
                self.kind
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            IdentifierKind::Uuid => write!(f, "{}", self.uuid.as_deref().unwrap_or_default()),
            IdentifierKind::Name => write!(f, "{}", self.name.as_deref().unwrap_or_default()),
        }
    }
}

/// A named placement target within the Arbor fleet
///
/// Each failure domain maps to one host cluster and the subnets machines
/// placed there attach to.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureDomainSpec {
    /// Failure domain name; unique within the cluster spec
    pub name: String,

    /// Host cluster backing this failure domain
    pub cluster: ResourceIdentifier,

    /// Subnets for machines placed in this failure domain
    pub subnets: Vec<ResourceIdentifier>,

    /// Whether control plane machines may be placed here
    #[serde(default)]
    pub control_plane: bool,
}

impl FailureDomainSpec {
    /// Validate the failure domain declaration
    pub fn validate(&self) -> Result<(), crate::Error> {
        super::validate_dns_identifier(&self.name).map_err(crate::Error::validation)?;
        self.cluster.validate()?;
        if self.subnets.is_empty() {
            return Err(crate::Error::validation(format!(
                "failure domain {} declares no subnets",
                self.name
            )));
        }
        for subnet in &self.subnets {
            subnet.validate()?;
        }
        Ok(())
    }
}

/// Endpoint of the workload cluster's API server
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneEndpoint {
    /// Host name or IP of the API server
    #[serde(default)]
    pub host: String,

    /// API server port
    #[serde(default)]
    pub port: u16,
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A single observed condition on an ArborCluster
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g. FailureDomainsReconciled)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod trust_bundle_kind {
        use super::*;

        #[test]
        fn test_from_str_valid() {
            assert_eq!(
                "String".parse::<TrustBundleKind>().unwrap(),
                TrustBundleKind::String
            );
            assert_eq!(
                "ConfigMap".parse::<TrustBundleKind>().unwrap(),
                TrustBundleKind::ConfigMap
            );
        }

        #[test]
        fn test_from_str_invalid() {
            let err = "Inline".parse::<TrustBundleKind>().unwrap_err();
            assert!(err.to_string().contains("unknown trust bundle kind"));
        }

        #[test]
        fn test_display_roundtrip() {
            for kind in [TrustBundleKind::String, TrustBundleKind::ConfigMap] {
                assert_eq!(kind.to_string().parse::<TrustBundleKind>().unwrap(), kind);
            }
        }

        #[test]
        fn test_wire_form_matches_kind_names() {
            let json = serde_json::to_string(&TrustBundleKind::ConfigMap).unwrap();
            assert_eq!(json, "\"ConfigMap\"");
            let json = serde_json::to_string(&TrustBundleKind::String).unwrap();
            assert_eq!(json, "\"String\"");
        }
    }

    mod trust_bundle_reference {
        use super::*;

        #[test]
        fn inline_bundle_requires_data() {
            let bundle = TrustBundleReference {
                kind: TrustBundleKind::String,
                data: None,
                name: None,
                namespace: None,
            };
            assert!(bundle.validate().is_err());

            let bundle = TrustBundleReference {
                kind: TrustBundleKind::String,
                data: Some("-----BEGIN CERTIFICATE-----".to_string()),
                name: None,
                namespace: None,
            };
            assert!(bundle.validate().is_ok());
        }

        #[test]
        fn config_map_bundle_requires_name() {
            let bundle = TrustBundleReference {
                kind: TrustBundleKind::ConfigMap,
                data: None,
                name: None,
                namespace: None,
            };
            assert!(bundle.validate().is_err());

            let bundle = TrustBundleReference {
                kind: TrustBundleKind::ConfigMap,
                data: None,
                name: Some("vantage-ca".to_string()),
                namespace: Some("arbor-system".to_string()),
            };
            assert!(bundle.validate().is_ok());
        }
    }

    mod resource_identifier {
        use super::*;

        #[test]
        fn uuid_constructor_validates() {
            let id = ResourceIdentifier::uuid("f47ac10b-58cc-4372-a567-0e02b2c3d479");
            assert!(id.validate().is_ok());
            assert_eq!(id.to_string(), "f47ac10b-58cc-4372-a567-0e02b2c3d479");
        }

        #[test]
        fn named_constructor_validates() {
            let id = ResourceIdentifier::named("rack-7-subnet");
            assert!(id.validate().is_ok());
            assert_eq!(id.to_string(), "rack-7-subnet");
        }

        #[test]
        fn kind_without_matching_value_fails() {
            let id = ResourceIdentifier {
                kind: IdentifierKind::Uuid,
                uuid: None,
                name: Some("ignored".to_string()),
            };
            assert!(id.validate().is_err());
        }

        #[test]
        fn wire_form_uses_type_field() {
            let id = ResourceIdentifier::named("blue-subnet");
            let json = serde_json::to_value(&id).unwrap();
            assert_eq!(json["type"], "name");
            assert_eq!(json["name"], "blue-subnet");
        }
    }

    mod failure_domain {
        use super::*;

        fn sample() -> FailureDomainSpec {
            FailureDomainSpec {
                name: "rack-1".to_string(),
                cluster: ResourceIdentifier::uuid("c1a2b3c4-0000-0000-0000-000000000001"),
                subnets: vec![ResourceIdentifier::named("tenant-net")],
                control_plane: true,
            }
        }

        #[test]
        fn valid_failure_domain_passes() {
            assert!(sample().validate().is_ok());
        }

        #[test]
        fn empty_subnets_fail() {
            let mut fd = sample();
            fd.subnets.clear();
            let err = fd.validate().unwrap_err();
            assert!(err.to_string().contains("declares no subnets"));
        }

        #[test]
        fn invalid_name_fails() {
            let mut fd = sample();
            fd.name = "Rack_1".to_string();
            assert!(fd.validate().is_err());
        }
    }

    mod vantage_endpoint {
        use super::*;

        #[test]
        fn port_defaults_when_omitted() {
            let endpoint: VantageEndpoint =
                serde_json::from_value(serde_json::json!({"address": "vantage.arbor.example"}))
                    .unwrap();
            assert_eq!(endpoint.port, 9443);
            assert!(!endpoint.insecure);
        }

        #[test]
        fn empty_address_fails_validation() {
            let endpoint = VantageEndpoint {
                address: String::new(),
                port: 9443,
                insecure: false,
                credential_ref: None,
                trust_bundle_ref: None,
            };
            assert!(endpoint.validate().is_err());
        }
    }

    mod condition {
        use super::*;

        #[test]
        fn new_condition_stamps_transition_time() {
            let before = Utc::now();
            let condition = Condition::new(
                CONDITION_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::True,
                "Reconciled",
                "2 failure domains configured",
            );
            assert!(condition.last_transition_time >= before);
            assert_eq!(condition.type_, "FailureDomainsReconciled");
        }

        #[test]
        fn wire_form_uses_kubernetes_field_names() {
            let condition = Condition::new(
                CONDITION_NO_FAILURE_DOMAINS_RECONCILED,
                ConditionStatus::True,
                "NoFailureDomains",
                "no failure domains declared in spec",
            );
            let json = serde_json::to_value(&condition).unwrap();
            assert_eq!(json["type"], "NoFailureDomainsReconciled");
            assert_eq!(json["status"], "True");
            assert!(json.get("lastTransitionTime").is_some());
        }
    }
}
