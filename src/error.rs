// In: src/error.rs

//! This module defines the single, unified error type for the entire nmrproc library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NmrProcError>;

#[derive(Error, Debug)]
pub enum NmrProcError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to our library's logic)
    // =========================================================================
    /// Malformed acquisition order, inconsistent dimension counts or an
    /// unsupported combination of acquisition features.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The numeric engine stopped on a specific operation. The locator is
    /// enough to highlight the operation in its dimension's list.
    #[error("Processing incomplete at {dim_key}[{op_index}] {op_name}: {message}")]
    IncompleteProcessing {
        op_name: String,
        dim_key: String,
        op_index: usize,
        message: String,
    },

    /// Any other engine-raised failure. The message is surfaced verbatim.
    #[error("{0}")]
    EngineFault(String),

    #[error("Processing was cancelled")]
    Cancelled,

    #[error("Script syntax error on line {line}: {message}")]
    ScriptSyntax { line: usize, message: String },

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem (e.g. a truncated FID file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a config.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    // =========================================================================
    // === Low-Level Raw Record Errors
    // =========================================================================
    #[error("Buffer length mismatch: expected a multiple of {0}, got {1}")]
    BufferMismatch(usize, usize),
}

impl NmrProcError {
    /// True for the failures a session recovers from by restoring its vectors.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NmrProcError::IncompleteProcessing { .. }
                | NmrProcError::EngineFault(_)
                | NmrProcError::Cancelled
                | NmrProcError::ScriptSyntax { .. }
        )
    }

    /// Locator of the failing operation as `(dim_key, op_index)`, if known.
    pub fn fault_locator(&self) -> Option<(&str, usize)> {
        match self {
            NmrProcError::IncompleteProcessing {
                dim_key, op_index, ..
            } => Some((dim_key.as_str(), *op_index)),
            _ => None,
        }
    }
}
