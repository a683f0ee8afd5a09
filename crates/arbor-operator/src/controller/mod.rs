//! Controller for the ArborCluster CRD
//!
//! The reconciler itself lives in [`cluster`]; [`status`] holds the pure
//! spec-to-status projection and [`ownership`] the shared-object
//! bookkeeping for credential Secrets and trust bundle ConfigMaps.

pub mod cluster;
pub mod ownership;
pub mod status;

pub use cluster::{error_policy, reconcile, Context, ContextBuilder, KubeClient, KubeClientImpl};
pub use ownership::{
    reconcile_credential_ref, reconcile_credential_ref_delete, reconcile_trust_bundle_ref,
    reconcile_trust_bundle_ref_delete,
};
pub use status::reconcile_failure_domains;
