//! This module finds corrupted acquisition groups by statistical scanning.
//!
//! A scan is read-only: it uses the indexer and a raw source but owns its
//! numeric buffers, so it never touches a session's live vectors.

pub mod corruption;
pub mod stats;

#[cfg(test)]
mod corruption_tests;

pub use corruption::{scan_for_corruption, ScanReport, VecIndexScore};
pub use stats::RunningStats;
