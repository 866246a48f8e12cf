//! Stage graph building and execution.
//!
//! This module provides:
//! - Stage definitions
//! - Graph validation into an immutable [`StageGraph`]
//! - Handler capability and explicit registry
//! - The DAG executor

mod definition;
mod executor;
mod graph;
mod handler;

#[cfg(test)]
mod executor_tests;

pub use definition::StageDefinition;
pub use executor::{run_definitions, DagExecutor, DagRunOutput, StageMeta};
pub use graph::StageGraph;
pub(crate) use graph::{find_cycle, stable_topological_sort};
pub use handler::{
    AsyncFnHandler, FnHandler, HandlerRegistry, PluginHandler, ResolvedHandlers, StageHandler,
    StagePlugin,
};
