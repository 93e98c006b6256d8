//! Test prioritization for faster feedback.
//!
//! Ordering: previously failed tests, then tests affected by the change,
//! then everything else — each bucket fastest-first by historical duration.

use std::collections::{BTreeSet, HashMap};

use tracing::info;

/// Reorder `all_tests` into failed / affected / rest buckets. Tests with no
/// recorded duration sort last within their bucket; ties keep input order.
pub fn prioritize_tests(
    all_tests: &[String],
    affected_tests: &BTreeSet<String>,
    failed_tests: &BTreeSet<String>,
    durations: &HashMap<String, f64>,
) -> Vec<String> {
    let mut failed: Vec<String> = Vec::new();
    let mut affected: Vec<String> = Vec::new();
    let mut rest: Vec<String> = Vec::new();

    for test in all_tests {
        if failed_tests.contains(test) {
            failed.push(test.clone());
        } else if affected_tests.contains(test) {
            affected.push(test.clone());
        } else {
            rest.push(test.clone());
        }
    }

    let duration_of = |t: &String| durations.get(t).copied().unwrap_or(f64::INFINITY);
    for bucket in [&mut failed, &mut affected, &mut rest] {
        bucket.sort_by(|a, b| {
            duration_of(a)
                .partial_cmp(&duration_of(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    if !failed.is_empty() {
        info!(count = failed.len(), "re-running previously failed tests first");
    }
    if !affected.is_empty() {
        info!(count = affected.len(), "tests affected by code changes");
    }

    let mut reordered = failed;
    reordered.extend(affected);
    reordered.extend(rest);
    reordered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
