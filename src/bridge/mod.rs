// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the stateless public-facing API of the nmrproc library. Hosts
// that do not keep a `ProcessingSession` alive (batch tools, FFI shims, tests)
// build, inspect and resolve scripts and scan raw files through it.
//
// Data Flow (Script Generation):
//
//   1. [Host]                       -> AcquisitionModel + OperationRegistry
//         |
//         `-> build_execution_script / build_display_script
//         |
//   2. [pipeline::script]           -> BuiltScript (text + output dims)
//         |
//         `-> resolve_output_path once the output dataset is known
//
// Data Flow (Inspection):
//
//   1. [Host]                       -> script text or raw FID path
//         |
//         `-> analyze_script  -> ScriptStats
//         `-> scan_fid_file   -> ScanReport
//
// ====================================================================================
pub mod format;
pub mod stateless_api;

// --- Low-Level Stateless API (for FFI and testing) ---
pub use stateless_api::{
    analyze_script, build_display_script, build_execution_script, resolve_output_path, scan_fid_file,
};

// --- Format Constants and Structs ---
pub use format::ScriptStats;
