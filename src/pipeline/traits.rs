// In: src/pipeline/traits.rs

//! Defines the seam between a processing session and the numeric engine that
//! runs its scripts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::NmrProcError;
use crate::pipeline::vector::FidVector;

/// A cooperative cancellation flag shared between a caller and a running engine.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// `Err(Cancelled)` once the flag is raised.
    pub fn check(&self) -> Result<(), NmrProcError> {
        if self.is_cancelled() {
            Err(NmrProcError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One execution request handed to a [`NumericEngine`].
pub struct EngineRequest<'a> {
    pub script: &'a str,
    /// The live vectors; the engine mutates them in place.
    pub vectors: &'a mut [FidVector],
    /// 1-based acquisition dimension the live vectors lie along.
    pub vector_dim: usize,
    /// When false only the blocks for `vector_dim` run; when true the whole
    /// script runs as part of full dataset processing.
    pub combined_with_data_processing: bool,
    pub cancel: &'a CancelFlag,
}

/// A numeric engine that executes pipeline scripts.
///
/// Engines must check `request.cancel` between top-level operations and
/// return `NmrProcError::Cancelled` once it is raised. A failure in a known
/// operation is reported as `IncompleteProcessing`; anything else as
/// `EngineFault`.
pub trait NumericEngine: Send {
    fn execute(&mut self, request: EngineRequest<'_>) -> Result<(), NmrProcError>;
}
