//! Helpers over stored test outcomes.
//!
//! Outcomes are recorded by the test-runner integration and consumed only by
//! the prioritization layer; the graph engine never reads them.

use std::collections::{BTreeMap, HashMap};

use crate::models::Outcome;

/// Node IDs that failed or errored on their last recorded run, sorted.
pub fn failed_tests(outcomes: &BTreeMap<String, Outcome>) -> Vec<String> {
    outcomes
        .values()
        .filter(|o| o.status.is_failure())
        .map(|o| o.node_id.clone())
        .collect()
}

/// Historical duration per node ID, in seconds.
pub fn test_durations(outcomes: &BTreeMap<String, Outcome>) -> HashMap<String, f64> {
    outcomes
        .iter()
        .map(|(node_id, o)| (node_id.clone(), o.duration))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
