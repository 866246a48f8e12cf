//! Per-signal pipeline state and node composition.
//!
//! Nodes run one at a time in a stable topological order over their
//! `dependencies`. Each node appends one trace entry. Ordinary nodes are
//! fail-hard; provider-backed leaves are fail-soft.

mod node;
mod pipeline_state;
mod provider;
mod registry;
mod runner;
mod trace;


pub use node::{NodeConfig, PipelineNode};
pub use pipeline_state::{
    EnrichmentResults, PipelineState, StateMetadata, ValidationReport, DEFAULT_SIGNAL_ID_MAX_LEN,
    SYNTHETIC_KEY_PREFIX,
};
pub use provider::{PredictionProvider, ProviderNode};
pub use registry::{FnNode, NodeRegistry};
pub use runner::{execution_order, NodeRunSummary, NodeRunner};
pub use trace::ExecutionTraceEntry;
