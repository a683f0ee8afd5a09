//! Arbor Kubernetes operator for workload cluster infrastructure
//!
//! Watches ArborCluster resources and reconciles them: projects declared
//! failure domains into status, keeps the ownership bookkeeping on shared
//! credential and trust bundle objects, and reports readiness.

#![deny(missing_docs)]

/// ArborCluster reconciliation (projection, ownership, readiness)
pub mod controller;
