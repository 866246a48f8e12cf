//! Testing utilities for signalflow pipelines.
//!
//! This module provides:
//! - Mock handlers, nodes, providers and pipelines
//! - Snapshot and state fixtures
//! - Assertions for traces and replay comparisons

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_changed_axes, assert_no_drift, assert_trace};
pub use fixtures::{
    fixture_scored_at, matching_outcome, scored_payload, snapshot_fixture, state_fixture,
    FIXTURE_CONFIG_HASH, FIXTURE_LOGIC_VERSION,
};
pub use mocks::{
    FailingHandler, FailingNode, MockNode, RecordingHandler, SlowHandler, StaticPipeline,
    StaticProvider, UnavailableProvider,
};
