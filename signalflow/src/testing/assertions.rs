//! Test assertions for traces and replay comparisons.

use crate::core::TraceStatus;
use crate::replay::Comparison;
use crate::state::PipelineState;

/// Asserts the trace node ids and statuses, in order.
pub fn assert_trace(state: &PipelineState, expected: &[(&str, TraceStatus)]) {
    let actual: Vec<(&str, TraceStatus)> = state
        .trace()
        .iter()
        .map(|e| (e.node_id.as_str(), e.status))
        .collect();
    assert_eq!(actual, expected, "Unexpected trace");
}

/// Asserts that every comparison axis is unchanged.
pub fn assert_no_drift(comparison: &Comparison) {
    assert!(
        !comparison.has_changes(),
        "Expected no drift, got: {:#?}",
        comparison.changes
    );
}

/// Asserts that exactly the given axes changed.
///
/// Axes are matched by substring against the `changed:` lines.
pub fn assert_changed_axes(comparison: &Comparison, axes: &[&str]) {
    let changed: Vec<&String> = comparison
        .changes
        .iter()
        .filter(|line| line.starts_with("changed:"))
        .collect();
    assert_eq!(
        changed.len(),
        axes.len(),
        "Expected {} changed axes, got: {:#?}",
        axes.len(),
        changed
    );
    for axis in axes {
        assert!(
            changed.iter().any(|line| line.contains(axis)),
            "Expected axis '{axis}' to change, got: {changed:#?}"
        );
    }
}
