//! Vantage control plane API surface for the Arbor cluster controller
//!
//! Mutating calls against Vantage are asynchronous: the gateway answers
//! with a task UUID and the caller watches that task until it reaches a
//! terminal state. This crate owns the consumed API surface (a trait over
//! the transport), task status classification, and the polling waiter.

#![deny(missing_docs)]

pub mod client;
pub mod task;

pub use client::{ApiError, TaskInfo, TaskState, VantageApi};
pub use task::{get_task_status, wait_for_task, wait_for_task_to_succeed, TASK_POLL_INTERVAL};
