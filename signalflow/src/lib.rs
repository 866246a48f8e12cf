//! # Signalflow
//!
//! Orchestration core for trading-signal pipelines.
//!
//! Signalflow provides:
//!
//! - **Graph validation**: stage lists are checked for duplicate ids, unknown
//!   dependencies and cycles before anything runs
//! - **DAG execution**: independent stages run concurrently, joins receive
//!   every parent payload, the first failure aborts the run
//! - **Per-signal state**: enrichment nodes run in a stable order with
//!   fail-hard and fail-soft semantics and an execution trace
//! - **Replay auditing**: stored signals are re-run and diffed against what
//!   was persisted
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signalflow::prelude::*;
//!
//! let graph = StageGraph::build(vec![
//!     StageDefinition::new("parse"),
//!     StageDefinition::new("score").with_dependency("parse"),
//! ])?;
//! let registry = HandlerRegistry::new()
//!     .with_fn("parse", |v, _| Ok(v))
//!     .with_fn("score", |v, _| Ok(v));
//!
//! let output = DagExecutor::from_registry(graph, &registry)?
//!     .run(signal, &RunContext::new())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod replay;
pub mod state;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::context::RunContext;
    pub use crate::core::{NodeOutcome, NodeType, StageKind, StageRunStatus, TraceStatus};
    pub use crate::errors::{
        ConfigurationError, GraphDefinitionError, ProviderUnavailableError, SignalflowError,
        StageExecutionError, StateInvariantError, StoreError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        DagExecutor, DagRunOutput, HandlerRegistry, StageDefinition, StageGraph, StageHandler,
        StagePlugin,
    };
    pub use crate::replay::{
        DagPipeline, PipelineEntry, ReplayComparator, ReplayOutcome, SignalStore, StoredSnapshot,
    };
    pub use crate::state::{
        NodeConfig, NodeRegistry, NodeRunner, PipelineNode, PipelineState, PredictionProvider,
        ProviderNode,
    };
    pub use crate::utils::Timestamp;
}
