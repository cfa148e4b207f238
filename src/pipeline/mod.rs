// In: src/pipeline/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Processing Pipeline
// ====================================================================================
//
// The pipeline turns a registry of per-dimension operations into a script and
// runs that script over vectors loaded from a raw acquisition.
//
//   1. [OperationRegistry]   <- edited by the host, keyed by DimKey
//         |
//         `-> [ScriptBuilder] -> BuiltScript (text + output dimension mapping)
//
//   2. [ProcessingSession]
//         |
//         `-> a. load_vectors: VectorIndexer + FidSource -> live/save FidVectors
//         |
//         `-> b. execute: NumericEngine mutates the live vectors in place
//         |
//         `-> c. on failure or cancel: live <- save, error returned to the host
//
// ====================================================================================

pub mod models;
pub mod registry;
pub mod script;
pub mod session;
pub mod traits;
pub mod vector;

#[cfg(test)]
mod session_tests;

pub use models::{DimKey, DimKind, Operation};
pub use registry::{compare_dim_keys, OpListUpdate, OperationRegistry};
pub use script::{
    build_dim_fragment, output_dim_mapping, parse_script, resolve_dataset_placeholder, BuiltScript,
    CreateTarget, ParsedScript, ScriptBuilder, ScriptExtras,
};
pub use session::{ExecutionHandle, ProcessingSession, RegistryPolicy, SessionState};
pub use traits::{CancelFlag, EngineRequest, NumericEngine};
pub use vector::FidVector;
