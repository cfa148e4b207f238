//! This file is the root of the `nmrproc` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`indexing`, `pipeline`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the types a host needs to open an acquisition, edit its
//!     operation registry and run a processing session.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod indexing;
pub mod pipeline;
pub mod raw;
pub mod scan;
pub mod traits;
pub mod types;
pub mod utils;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use config::ProcessorConfig;
pub use engine::DispatchEngine;
pub use error::NmrProcError;
pub use indexing::{VecIndex, VectorIndexer};
pub use observability::enable_verbose_logging;
pub use pipeline::{
    DimKey, ExecutionHandle, FidVector, NumericEngine, Operation, OperationRegistry, ProcessingSession,
    RegistryPolicy, ScriptBuilder,
};
pub use raw::{BinaryFid, FidSource, MemoryFid};
pub use scan::{ScanReport, VecIndexScore};
pub use types::{AcqMode, AcquisitionModel, SkipGroup};
