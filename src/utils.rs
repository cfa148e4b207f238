//! This module provides a set of shared, low-level utility functions used
//! throughout the nmrproc core.
//!
//! Its primary responsibilities include:
//! 1.  Decoding raw little-endian byte slices into typed samples.
//! 2.  Packing interleaved real/imaginary samples into complex points.
//! 3.  Normalizing filesystem paths for embedding in pipeline scripts.

use std::path::{Path, PathBuf};

use num_complex::Complex64;

use crate::error::NmrProcError;
use crate::traits::RawSample;

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Decodes a little-endian byte buffer into `f64` samples.
///
/// Samples are read one by one, so the input does not need to be aligned for `T`.
pub fn decode_samples<T: RawSample>(bytes: &[u8]) -> Result<Vec<f64>, NmrProcError> {
    let width = std::mem::size_of::<T>();
    if bytes.len() % width != 0 {
        return Err(NmrProcError::BufferMismatch(width, bytes.len()));
    }
    Ok(bytes
        .chunks_exact(width)
        .map(bytemuck::pod_read_unaligned::<T>)
        .map(RawSample::to_sample)
        .collect())
}

/// Packs `[re, im, re, im, ...]` samples into complex points.
///
/// For real-valued records (`complex == false`) each sample becomes a point
/// with a zero imaginary part.
pub fn pack_complex(samples: &[f64], complex: bool, out: &mut [Complex64]) -> Result<(), NmrProcError> {
    let expected = if complex { out.len() * 2 } else { out.len() };
    if samples.len() != expected {
        return Err(NmrProcError::BufferMismatch(expected, samples.len()));
    }
    if complex {
        for (point, pair) in out.iter_mut().zip(samples.chunks_exact(2)) {
            *point = Complex64::new(pair[0], pair[1]);
        }
    } else {
        for (point, &re) in out.iter_mut().zip(samples) {
            *point = Complex64::new(re, 0.0);
        }
    }
    Ok(())
}

//==================================================================================
// 2. Path Helpers
//==================================================================================

/// Resolves `path` against the current directory when it is relative.
pub fn absolute_path(path: &Path) -> Result<PathBuf, NmrProcError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Renders a path with forward slashes only, the form the script engine expects.
pub fn script_path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
