//! Durable, resumable multi-agent workflow orchestration for LM pipelines.
//!
//! A caller hands [`orchestrator::run_workflow`] a request; a planner LM
//! decomposes it into a task plan, the [`analyzer`] layers the plan's
//! `{{variable}}` reference graph into parallel batches, and the
//! [`executor`] runs each batch against worker sub-agents with outputs
//! persisted in a [`relay_store::MemoryStore`]. Re-running the same
//! workflow id resumes from whatever already completed.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use relay_core::config::CoreConfig;
//! use relay_core::orchestrator;
//! use relay_core::provider::Provider;
//! use relay_store::{MemoryStore, StoreConfig};
//!
//! # async fn demo(planner_client: Arc<dyn relay_core::provider::LmClient>,
//! #               worker_client: Arc<dyn relay_core::provider::LmClient>)
//! #               -> Result<(), relay_core::error::WorkflowError> {
//! let store = MemoryStore::open(&StoreConfig::from_env()).await?;
//! let config = CoreConfig::from_env();
//! let planner = Provider::builder(planner_client).build();
//! let worker = Arc::new(Provider::builder(worker_client).build());
//!
//! let results = orchestrator::run_workflow(
//!     &store,
//!     "book-9f2",
//!     "Write a short book about distributed systems",
//!     &planner,
//!     worker,
//!     &config,
//! )
//! .await?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod plan;
pub mod provider;
pub mod resilience;
pub mod stage;
pub mod template;

pub use agent::{AgentRegistry, ExecutionInput, ExecutionResult, SubAgent};
pub use config::CoreConfig;
pub use error::WorkflowError;
pub use executor::ExecutorConfig;
pub use plan::TaskDefinition;
pub use provider::{LmClient, LmError, Provider, ProviderError};
