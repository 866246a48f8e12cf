//! Human-readable replay reports.

use super::{ReplayOutcome, ReplayResult};
use crate::utils::format_iso8601;
use std::fmt::Write;

/// Renders a replay outcome for operators.
#[must_use]
pub fn render_report(outcome: &ReplayOutcome) -> String {
    match outcome {
        ReplayOutcome::NotFound { signal_id } => {
            format!("Signal {signal_id} not found; nothing to replay.\n")
        }
        ReplayOutcome::Replayed(result) => render_result(result),
    }
}

fn render_result(result: &ReplayResult) -> String {
    let mut out = String::new();
    let meta = &result.replay_meta;

    let _ = writeln!(out, "Replay of signal {}", result.signal_id);
    let _ = writeln!(
        out,
        "  ran at {} with pipeline {}",
        format_iso8601(&meta.ran_at),
        meta.pipeline_version
    );
    if meta.lossy_input {
        let _ = writeln!(out, "  WARNING: lossy input, results may differ for that reason alone");
    }
    for note in &meta.notes {
        let _ = writeln!(out, "  note: {note}");
    }

    let _ = writeln!(
        out,
        "  stored:     score {:.4}, decision {} ({:.4})",
        result.stored.score, result.stored.decision, result.stored.confidence
    );
    let _ = writeln!(
        out,
        "  recomputed: score {:.4}, decision {} ({:.4})",
        result.recomputed.score, result.recomputed.decision, result.recomputed.confidence
    );

    let _ = writeln!(out, "Comparison:");
    for line in &result.comparison.changes {
        let _ = writeln!(out, "  - {line}");
    }

    if let Some(stages) = &result.stage_summaries {
        let _ = writeln!(out, "Stages:");
        for stage in stages {
            let _ = writeln!(
                out,
                "  {} [{}] {:.1}ms",
                stage.id, stage.status, stage.duration_ms
            );
        }
    }

    let verdict = if result.comparison.has_changes() {
        "DRIFT DETECTED"
    } else {
        "NO DRIFT"
    };
    let _ = writeln!(out, "Result: {verdict}");
    out
}
