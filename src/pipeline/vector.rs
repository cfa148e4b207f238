// In: src/pipeline/vector.rs

use ndarray::Array1;
use num_complex::Complex64;

/// One processing-ready vector held by a session.
#[derive(Debug, Clone, PartialEq)]
pub struct FidVector {
    pub data: Array1<Complex64>,
    pub complex: bool,
    /// Output row coordinates, one per non-leading synthetic dimension.
    pub rows: Vec<usize>,
    /// False when the vector was zero-filled instead of read.
    pub acquired: bool,
}

impl FidVector {
    pub fn new(data: Array1<Complex64>, complex: bool, rows: Vec<usize>) -> Self {
        Self {
            data,
            complex,
            rows,
            acquired: true,
        }
    }

    pub fn zeros(len: usize, complex: bool, rows: Vec<usize>) -> Self {
        Self {
            data: Array1::zeros(len),
            complex,
            rows,
            acquired: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
