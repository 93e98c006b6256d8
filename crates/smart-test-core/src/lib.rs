//! smart-test core library — dependency-graph-based affected-test selection.
//!
//! Given a set of changed source files, this crate determines exactly which
//! tests are affected so a runner can skip the rest. Static import analysis
//! over a Python source tree builds a bidirectional module graph, maintained
//! incrementally under a content-addressed staleness model; affected-set
//! queries walk the transitive `imported_by` closure and union in the tests
//! mapped to each affected module.

pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod query;
pub mod store;
pub mod vcs;
pub mod workflow;

pub use config::ProjectLayout;
pub use errors::{SmartTestError, SmartTestResult};
pub use models::{AffectedSet, DependencyGraph};
pub use store::cache::CacheStore;
