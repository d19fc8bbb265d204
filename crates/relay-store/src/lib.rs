//! Durable persistence for relay workflows.
//!
//! A process-local SQLite store with three logical tables:
//!
//! - `plans` -- one immutable plan (a JSON `TaskDefinition` array) per
//!   workflow id.
//! - `task_outputs` -- the text produced by each completed task, keyed by
//!   `(workflow_id, task_name)`. Read back on resume to skip finished work.
//! - `agent_memory` -- a bounded, append-only timeline of entries per agent.
//!
//! The [`store::MemoryStore`] facade owns a connection pool and is cheap to
//! clone; the `queries` modules expose the underlying query functions for
//! callers that already hold a pool.

pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use models::{TaskDefinition, WorkflowState, WorkflowSummary};
pub use store::MemoryStore;
