//! Persistence: the on-disk cache store, fingerprints, outcomes, coverage,
//! and the optional remote cache seam.

pub mod cache;
pub mod coverage;
pub mod fingerprints;
pub mod outcomes;
pub mod remote;
