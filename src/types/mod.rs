//! This module defines the core, strongly-typed data representations used
//! throughout the nmrproc pipeline.
//!
//! It includes the acquisition model shared by the indexer, scanner and
//! session, the raw sample encodings, and skip-group records.

pub mod acquisition;
pub mod sample_format;
pub mod skip_group;

// Re-export the main type(s) for easier access.
pub use acquisition::{AcqMode, AcquisitionModel, DimParams};
pub use sample_format::SampleFormat;
pub use skip_group::{format_skip_groups, parse_skip_groups, SkipGroup};
