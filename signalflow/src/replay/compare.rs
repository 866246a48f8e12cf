//! Stored-vs-recomputed comparison.
//!
//! Every axis produces exactly one line, prefixed either `changed:` or
//! `unchanged:`, in a fixed order. Lines depend only on the two results, so
//! replaying the same signal twice yields identical text.

use super::{NoveltyInfo, ScoredResult};
use serde::{Deserialize, Serialize};

/// Default tolerance for numeric axes.
pub const DEFAULT_SCORE_EPSILON: f64 = 1e-4;

/// Outcome of comparing a stored result with a recomputed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Recomputed score minus stored score.
    pub delta: f64,
    /// Whether the decision value differs.
    pub decision_changed: bool,
    /// One line per axis.
    pub changes: Vec<String>,
}

impl Comparison {
    /// Returns true if any axis changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|line| line.starts_with("changed:"))
    }
}

/// Compares two results on all seven axes.
#[must_use]
pub fn compare_results(stored: &ScoredResult, recomputed: &ScoredResult, epsilon: f64) -> Comparison {
    let delta = recomputed.score - stored.score;
    let decision_changed = stored.decision != recomputed.decision;

    let changes = vec![
        numeric_line("score", stored.score, recomputed.score, epsilon),
        if decision_changed {
            format!(
                "changed: decision {} -> {}",
                stored.decision, recomputed.decision
            )
        } else {
            format!("unchanged: decision {}", stored.decision)
        },
        numeric_line("confidence", stored.confidence, recomputed.confidence, epsilon),
        reason_codes_line(&stored.reason_codes, &recomputed.reason_codes),
        tag_line(
            "scoring config hash",
            stored.config_hash.as_deref(),
            recomputed.config_hash.as_deref(),
        ),
        tag_line(
            "scoring logic version",
            stored.logic_version.as_deref(),
            recomputed.logic_version.as_deref(),
        ),
        novelty_line(stored.novelty.as_ref(), recomputed.novelty.as_ref()),
    ];

    Comparison {
        delta,
        decision_changed,
        changes,
    }
}

fn numeric_line(axis: &str, before: f64, after: f64, epsilon: f64) -> String {
    let delta = after - before;
    if delta.abs() > epsilon {
        format!("changed: {axis} {before:.4} -> {after:.4} (delta {delta:+.4})")
    } else {
        format!("unchanged: {axis} {before:.4}")
    }
}

fn reason_codes_line(before: &[String], after: &[String]) -> String {
    let mut sorted_before = before.to_vec();
    let mut sorted_after = after.to_vec();
    sorted_before.sort();
    sorted_before.dedup();
    sorted_after.sort();
    sorted_after.dedup();
    if sorted_before == sorted_after {
        format!("unchanged: reason codes [{}]", sorted_before.join(", "))
    } else {
        format!(
            "changed: reason codes [{}] -> [{}]",
            before.join(", "),
            after.join(", ")
        )
    }
}

fn tag_line(axis: &str, before: Option<&str>, after: Option<&str>) -> String {
    let before_text = before.unwrap_or("<none>");
    let after_text = after.unwrap_or("<none>");
    if before == after {
        format!("unchanged: {axis} {before_text}")
    } else {
        format!("changed: {axis} {before_text} -> {after_text}")
    }
}

fn novelty_line(before: Option<&NoveltyInfo>, after: Option<&NoveltyInfo>) -> String {
    let before = before.map_or_else(|| "<none>".to_string(), NoveltyInfo::stable_view);
    let after = after.map_or_else(|| "<none>".to_string(), NoveltyInfo::stable_view);
    if before == after {
        format!("unchanged: novelty {before}")
    } else {
        format!("changed: novelty {before} -> {after}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result() -> ScoredResult {
        ScoredResult {
            score: 72.5,
            decision: "take".into(),
            confidence: 0.8,
            reason_codes: vec!["TREND_UP".into(), "VOLUME_SPIKE".into()],
            config_hash: Some("abc123".into()),
            logic_version: Some("scoring-v3".into()),
            novelty: Some(NoveltyInfo {
                classification: "novel".into(),
                is_duplicate: false,
                duplicate_of: None,
                computed_at: None,
            }),
        }
    }

    #[test]
    fn test_identical_results_report_every_axis_unchanged() {
        let cmp = compare_results(&result(), &result(), DEFAULT_SCORE_EPSILON);

        assert_eq!(cmp.changes.len(), 7);
        assert!(cmp.changes.iter().all(|l| l.starts_with("unchanged:")));
        assert!(!cmp.has_changes());
        assert!(!cmp.decision_changed);
        assert_eq!(cmp.delta, 0.0);
    }

    #[test]
    fn test_score_within_epsilon_is_unchanged() {
        let mut after = result();
        after.score += 0.00005;
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        assert_eq!(cmp.changes[0], "unchanged: score 72.5000");
    }

    #[test]
    fn test_score_change_reports_signed_delta() {
        let mut after = result();
        after.score = 70.25;
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);

        assert_eq!(cmp.changes[0], "changed: score 72.5000 -> 70.2500 (delta -2.2500)");
        assert!((cmp.delta + 2.25).abs() < 1e-9);
    }

    #[test]
    fn test_decision_change() {
        let mut after = result();
        after.decision = "skip".into();
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);

        assert!(cmp.decision_changed);
        assert_eq!(cmp.changes[1], "changed: decision take -> skip");
    }

    #[test]
    fn test_reason_codes_are_order_independent() {
        let mut after = result();
        after.reason_codes.reverse();
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        assert!(cmp.changes[3].starts_with("unchanged:"));

        after.reason_codes.push("NEWS_BULLISH".into());
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        assert_eq!(
            cmp.changes[3],
            "changed: reason codes [TREND_UP, VOLUME_SPIKE] -> [VOLUME_SPIKE, TREND_UP, NEWS_BULLISH]"
        );
    }

    #[test]
    fn test_repeated_reason_codes_compare_as_a_set() {
        let mut after = result();
        after.reason_codes.push("TREND_UP".into());
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);

        assert_eq!(cmp.changes[3], "unchanged: reason codes [TREND_UP, VOLUME_SPIKE]");
    }

    #[test]
    fn test_config_hash_mismatch_names_both_hashes() {
        let mut after = result();
        after.config_hash = Some("def456".into());
        after.score = result().score;

        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        let line = cmp
            .changes
            .iter()
            .find(|l| l.contains("config hash"))
            .unwrap();
        assert!(line.contains("abc123") && line.contains("def456"));

        let same = compare_results(&result(), &result(), DEFAULT_SCORE_EPSILON);
        assert!(!same
            .changes
            .iter()
            .any(|l| l.contains("abc123") && l.contains("def456")));
    }

    #[test]
    fn test_logic_version_drift() {
        let mut after = result();
        after.logic_version = Some("scoring-v4".into());
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        assert_eq!(
            cmp.changes[5],
            "changed: scoring logic version scoring-v3 -> scoring-v4"
        );
    }

    #[test]
    fn test_novelty_computed_at_is_never_a_change() {
        let mut after = result();
        if let Some(novelty) = after.novelty.as_mut() {
            novelty.computed_at = Some(chrono::Utc::now());
        }
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        assert!(cmp.changes[6].starts_with("unchanged: novelty"));

        if let Some(novelty) = after.novelty.as_mut() {
            novelty.is_duplicate = true;
        }
        let cmp = compare_results(&result(), &after, DEFAULT_SCORE_EPSILON);
        assert!(cmp.changes[6].starts_with("changed: novelty"));
    }
}
