// In: src/bridge/format.rs

//! Defines the textual contract of the pipeline script: directive names,
//! reserved header keys and the output placeholder. This is the single source
//! of truth shared by the script builder, the script parser and the engine.

use serde::{Deserialize, Serialize};

//==================================================================================
// I. Directives
//==================================================================================

/// Names the raw FID the script processes.
pub const FID_DIRECTIVE: &str = "FID";
/// Names the output dataset, or carries the placeholder.
pub const CREATE_DIRECTIVE: &str = "CREATE";
/// Opens a block of operations on acquisition dimensions.
pub const DIM_DIRECTIVE: &str = "DIM";
/// Opens a block of operations on output dataset dimensions.
pub const PDIM_DIRECTIVE: &str = "PDIM";
/// Engine options line written after the imports.
pub const PROC_OPTS_DIRECTIVE: &str = "procOpts";
/// Terminates every script.
pub const RUN_DIRECTIVE: &str = "run";

//==================================================================================
// II. Header Keys & Placeholder
//==================================================================================

/// Directives recognized outside any `DIM` block that describe the acquisition.
pub const RESERVED_HEADER_KEYS: &[&str] = &[
    "skip", "sw", "sf", "ref", "label", "acqOrder", "acqarray", "acqsize", "tdsize", "fixdsp",
];

/// The output-path placeholder used when a config does not name another.
pub const DEFAULT_DATASET_PLACEHOLDER: &str = "_DATASET_";

//==================================================================================
// III. Script Summary Contract
//==================================================================================

/// A structural summary of a pipeline script, produced without running it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScriptStats {
    /// Lines up to and including `run()`.
    pub line_count: usize,
    /// Number of `DIM`/`PDIM` blocks in text order.
    pub block_count: usize,
    /// Registry keys touched by the script, in registry order.
    pub keys: Vec<String>,
    /// Enabled operations across all blocks.
    pub enabled_ops: usize,
    pub disabled_ops: usize,
    /// True while `CREATE` still carries the output placeholder.
    pub has_placeholder: bool,
}
