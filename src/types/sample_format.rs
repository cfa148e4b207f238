//! This module defines the canonical, type-safe representation of the sample
//! encodings found in raw FID records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::NmrProcError;
use crate::utils::decode_samples;

/// The on-disk encoding of one real-valued sample in a raw record.
///
/// All encodings are little-endian; complex records store `re, im` pairs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    Int16,
    Int32,
    #[default]
    Float32,
    Float64,
}

impl SampleFormat {
    /// Width of one sample in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Decodes a little-endian byte buffer in this format into `f64` samples.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<f64>, NmrProcError> {
        match self {
            Self::Int16 => decode_samples::<i16>(bytes),
            Self::Int32 => decode_samples::<i32>(bytes),
            Self::Float32 => decode_samples::<f32>(bytes),
            Self::Float64 => decode_samples::<f64>(bytes),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dispatches_on_width() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3i16.to_le_bytes());
        bytes.extend_from_slice(&(-4i16).to_le_bytes());
        assert_eq!(SampleFormat::Int16.decode(&bytes).unwrap(), vec![3.0, -4.0]);
        // The same four bytes are a single Int32 sample.
        assert_eq!(SampleFormat::Int32.decode(&bytes).unwrap().len(), 1);
        assert!(SampleFormat::Float64.decode(&bytes).is_err());
    }

    #[test]
    fn test_serde_names_are_snake_case() {
        let json = serde_json::to_string(&SampleFormat::Float64).unwrap();
        assert_eq!(json, "\"float64\"");
        let parsed: SampleFormat = serde_json::from_str("\"int32\"").unwrap();
        assert_eq!(parsed, SampleFormat::Int32);
    }
}
