// In: src/raw/memory.rs

use num_complex::Complex64;

use crate::error::NmrProcError;
use crate::raw::{missing_record, FidSource};

/// An in-memory FID, used for synthetic acquisitions and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct MemoryFid {
    points: usize,
    complex: bool,
    records: Vec<Vec<Complex64>>,
}

impl MemoryFid {
    pub fn new(points: usize, complex: bool) -> Self {
        Self {
            points,
            complex,
            records: Vec::new(),
        }
    }

    /// Builds `count` records, filling point `p` of record `r` with `f(r, p)`.
    pub fn from_fn(count: usize, points: usize, complex: bool, f: impl Fn(usize, usize) -> Complex64) -> Self {
        let records = (0..count)
            .map(|r| (0..points).map(|p| f(r, p)).collect())
            .collect();
        Self {
            points,
            complex,
            records,
        }
    }

    pub fn push_record(&mut self, record: Vec<Complex64>) -> Result<(), NmrProcError> {
        if record.len() != self.points {
            return Err(NmrProcError::BufferMismatch(self.points, record.len()));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn record_mut(&mut self, index: usize) -> Option<&mut Vec<Complex64>> {
        self.records.get_mut(index)
    }
}

impl FidSource for MemoryFid {
    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn points_per_record(&self) -> usize {
        self.points
    }

    fn is_complex(&self) -> bool {
        self.complex
    }

    fn read_record(&self, index: usize, out: &mut [Complex64]) -> Result<(), NmrProcError> {
        let record = self
            .records
            .get(index)
            .ok_or_else(|| missing_record(index, self.records.len()))?;
        if out.len() != record.len() {
            return Err(NmrProcError::BufferMismatch(record.len(), out.len()));
        }
        out.copy_from_slice(record);
        Ok(())
    }
}
