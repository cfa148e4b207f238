//! This module provides read access to raw FID records.
//!
//! Every source exposes the same record-oriented view: a fixed number of
//! records, each `points_per_record` complex (or real) points long. Reads take
//! `&self` so a scan can run alongside a session that holds the same source.

use num_complex::Complex64;

use crate::error::NmrProcError;

pub mod binary;
pub mod memory;

pub use binary::BinaryFid;
pub use memory::MemoryFid;

/// A source of raw acquisition records.
pub trait FidSource: Send + Sync {
    fn record_count(&self) -> usize;

    fn points_per_record(&self) -> usize;

    /// True when records hold interleaved real/imaginary pairs.
    fn is_complex(&self) -> bool;

    /// Reads record `index` into `out`, which holds `points_per_record` points.
    ///
    /// A missing or truncated record is an immediate I/O error.
    fn read_record(&self, index: usize, out: &mut [Complex64]) -> Result<(), NmrProcError>;
}

pub(crate) fn missing_record(index: usize, count: usize) -> NmrProcError {
    NmrProcError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("record {} requested from a source with {} records", index, count),
    ))
}
