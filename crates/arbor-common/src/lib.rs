//! Common types for the Arbor cluster controller: CRDs, errors, and
//! finalizer token derivation.

#![deny(missing_docs)]

pub mod crd;
pub mod error;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Finalizer placed on an ArborCluster itself while its shared references
/// are still being released.
pub const ARBORCLUSTER_FINALIZER: &str = "arborcluster.infrastructure.arbor.dev/finalizer";

/// Legacy finalizer from the old single-token scheme on shared credential
/// objects.
///
/// Never added anymore; removed on sight during reference reconciliation.
/// A strict prefix of every per-owner token, so the two can never collide.
pub const DEPRECATED_CREDENTIAL_FINALIZER: &str = "arborcluster.infrastructure.arbor.dev";

/// Derive the finalizer token a cluster places on a shared Secret or
/// ConfigMap it references.
///
/// Stable for a given (name, namespace) pair. Each owning cluster holds its
/// own token, so the token set on the shared object is the live reference
/// count: the last token disappears only once every owner has released.
pub fn credential_finalizer(name: &str, namespace: &str) -> String {
    format!("arborcluster.infrastructure.arbor.dev/{namespace}-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_finalizer_is_stable_and_owner_specific() {
        let a = credential_finalizer("cluster-a", "default");
        assert_eq!(a, "arborcluster.infrastructure.arbor.dev/default-cluster-a");
        assert_eq!(a, credential_finalizer("cluster-a", "default"));

        let b = credential_finalizer("cluster-b", "default");
        assert_ne!(a, b, "distinct owners must derive distinct tokens");

        let other_ns = credential_finalizer("cluster-a", "prod");
        assert_ne!(a, other_ns, "same name in another namespace is another owner");
    }

    #[test]
    fn deprecated_token_never_matches_a_per_owner_token() {
        // Per-owner tokens always carry a slash-separated owner segment.
        let token = credential_finalizer("x", "y");
        assert_ne!(token, DEPRECATED_CREDENTIAL_FINALIZER);
        assert!(token.starts_with(DEPRECATED_CREDENTIAL_FINALIZER));
    }
}
