//! Replay and audit.
//!
//! A replay reads one stored snapshot, rebuilds its input, re-runs the
//! current pipeline with the stored scoring time pinned, and diffs the two
//! results. Nothing is ever written back to the store.

mod comparator;
mod compare;
mod dag_pipeline;
mod hash;
mod reconstruct;
mod report;
mod snapshot;
mod store;


pub use comparator::{
    PipelineEntry, ReplayComparator, ReplayMeta, ReplayOutcome, ReplayResult, RunOptions,
};
pub use compare::{compare_results, Comparison, DEFAULT_SCORE_EPSILON};
pub use dag_pipeline::DagPipeline;
pub use hash::{canonical_config_hash, canonicalize, hash_serializable};
pub use reconstruct::{reconstruct_input, ReconstructedInput, LOSSY_INPUT_NOTE};
pub use report::render_report;
pub use snapshot::{
    DecisionRecord, MarketInfo, NoveltyInfo, PipelineOutcome, ScoredResult, ScoringRecord,
    StoredSnapshot,
};
#[cfg(test)]
pub use store::MockSignalStore;
pub use store::{InMemorySignalStore, JsonFileSignalStore, SignalStore};
