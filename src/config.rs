// In: src/config.rs

//! The single source of truth for all nmrproc configuration.
//!
//! This module defines the unified `ProcessorConfig` struct, which is designed to
//! be created once at the application boundary (e.g., from a user's JSON file)
//! and then passed down through the system via a shared, read-only
//! `Arc<ProcessorConfig>`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bridge::format::DEFAULT_DATASET_PLACEHOLDER;
use crate::error::NmrProcError;
use crate::types::SampleFormat;

//==================================================================================
// I. Section Structs
//==================================================================================

/// Settings for the corruption scanner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ScanConfig {
    /// Number of standard deviations above the mean a group score must exceed.
    #[serde(default = "default_scan_ratio")]
    pub ratio: f64,

    /// Upper bound on the number of reported groups.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ratio: default_scan_ratio(),
            max_results: default_max_results(),
        }
    }
}

/// Settings for the text the script builder emits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ScriptConfig {
    /// Setup lines written before every execution script.
    #[serde(default = "default_imports")]
    pub imports: Vec<String>,

    /// Engine options line, written after the imports when present.
    #[serde(default = "default_process_options")]
    pub process_options: Option<String>,

    /// Token standing in for the output dataset path until one is chosen.
    #[serde(default = "default_dataset_placeholder")]
    pub dataset_placeholder: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            imports: default_imports(),
            process_options: default_process_options(),
            dataset_placeholder: default_dataset_placeholder(),
        }
    }
}

/// Layout of binary FID files.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RawConfig {
    #[serde(default)]
    pub sample_format: SampleFormat,

    /// Bytes skipped once at the start of the file.
    #[serde(default)]
    pub header_bytes: u64,

    /// Bytes skipped before every record.
    #[serde(default)]
    pub block_header_bytes: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append log output to this file instead of stderr.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

//==================================================================================
// II. The Unified ProcessorConfig
//==================================================================================

/// The single, unified configuration for the processing engine.
/// This struct is created once and shared throughout the system via an `Arc`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessorConfig {
    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub raw: RawConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProcessorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, NmrProcError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, NmrProcError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Helper for `serde` to provide a default for `ScanConfig::ratio`.
fn default_scan_ratio() -> f64 {
    3.0
}

fn default_max_results() -> usize {
    20
}

fn default_imports() -> Vec<String> {
    vec!["import os".to_string(), "from pyproc import *".to_string()]
}

fn default_process_options() -> Option<String> {
    Some("procOpts(nprocess=4)".to_string())
}

fn default_dataset_placeholder() -> String {
    DEFAULT_DATASET_PLACEHOLDER.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_equals_default() {
        let config = ProcessorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ProcessorConfig::default());
        assert_eq!(config.scan.ratio, 3.0);
        assert_eq!(config.script.dataset_placeholder, "_DATASET_");
        assert_eq!(config.raw.sample_format, SampleFormat::Float32);
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let json = r#"{
            "scan": { "max_results": 5 },
            "raw": { "sample_format": "int32", "header_bytes": 32 },
            "script": { "process_options": null }
        }"#;
        let config = ProcessorConfig::from_json_str(json).unwrap();
        assert_eq!(config.scan.max_results, 5);
        assert_eq!(config.scan.ratio, 3.0);
        assert_eq!(config.raw.sample_format, SampleFormat::Int32);
        assert_eq!(config.raw.header_bytes, 32);
        assert_eq!(config.script.process_options, None);
        assert_eq!(config.script.imports.len(), 2);
    }

    #[test]
    fn test_malformed_json_is_a_serde_error() {
        let result = ProcessorConfig::from_json_str("{ \"scan\": 3 }");
        assert!(matches!(result, Err(NmrProcError::SerdeJson(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = ProcessorConfig::from_path("/definitely/not/here/nmrproc.json");
        assert!(matches!(result, Err(NmrProcError::Io(_))));
    }
}
