//! Core domain enums shared by the executor, state and replay layers.

mod status;

pub use status::{NodeOutcome, NodeType, StageKind, StageRunStatus, TraceStatus};
