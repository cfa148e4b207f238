// In: src/engine/dispatch.rs

//! A numeric engine that walks a parsed script and dispatches each enabled
//! operation to a registered handler.
//!
//! Handlers receive the operation and the live vectors. A handler error, or
//! an operation with no handler, stops the run with `IncompleteProcessing`
//! naming the operation's position in its block.

use std::iter;

use hashbrown::HashMap;
use num_complex::Complex64;
use ndarray::Array1;

use crate::error::NmrProcError;
use crate::pipeline::models::{unquote, DimKey, DimKind, Operation};
use crate::pipeline::script::parse_script;
use crate::pipeline::traits::{EngineRequest, NumericEngine};
use crate::pipeline::vector::FidVector;

/// An operation implementation. The error string becomes the failure message.
pub type OpHandler = Box<dyn Fn(&Operation, &mut [FidVector]) -> Result<(), String> + Send + Sync>;

pub struct DispatchEngine {
    handlers: HashMap<String, OpHandler>,
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchEngine {
    /// An engine with the built-in handlers registered.
    pub fn new() -> Self {
        let mut engine = Self::empty();
        engine.register("ZF", zero_fill);
        engine.register("SCALE", scale);
        engine.register("PHASE", phase);
        engine.register("FAIL", fail);
        // Consumed while loading vectors and building scripts.
        engine.register("TDCOMB", |_, _| Ok(()));
        engine.register("SKIP", |_, _| Ok(()));
        engine
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `name` (case-insensitive), replacing any
    /// previous handler.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&Operation, &mut [FidVector]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.handlers.insert(name.to_ascii_uppercase(), Box::new(handler));
    }

    pub fn with_handler<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Operation, &mut [FidVector]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_uppercase())
    }
}

/// True when a block runs during a vector-only (not combined) execution.
fn applies_to_vectors(key: &DimKey, vector_dim: usize) -> bool {
    key.kind() == DimKind::All || key.is_single_dim(vector_dim)
}

impl NumericEngine for DispatchEngine {
    fn execute(&mut self, request: EngineRequest<'_>) -> Result<(), NmrProcError> {
        let EngineRequest {
            script,
            vectors,
            vector_dim,
            combined_with_data_processing,
            cancel,
        } = request;
        if vectors.is_empty() {
            return Err(NmrProcError::EngineFault("no vectors to process".to_string()));
        }
        let parsed = parse_script(script)?;

        for (key, ops) in &parsed.blocks {
            if !combined_with_data_processing && !applies_to_vectors(key, vector_dim) {
                continue;
            }
            for (op_index, op) in ops.iter().enumerate() {
                cancel.check()?;
                if op.is_disabled() {
                    continue;
                }
                let incomplete = |message: String| NmrProcError::IncompleteProcessing {
                    op_name: op.name().to_string(),
                    dim_key: key.to_string(),
                    op_index,
                    message,
                };
                let handler = self
                    .handlers
                    .get(&op.name().to_ascii_uppercase())
                    .ok_or_else(|| incomplete("unknown operation".to_string()))?;
                handler(op, &mut *vectors).map_err(incomplete)?;
                log::trace!("{}[{}] {} done", key, op_index, op);
            }
        }
        Ok(())
    }
}

//==================================================================================
// Built-in Handlers
//==================================================================================

fn zero_fill(op: &Operation, vectors: &mut [FidVector]) -> Result<(), String> {
    let factor = op.param_f64("factor", 1.0).map_err(|e| e.to_string())?;
    if !(0.0..=8.0).contains(&factor) || factor.fract() != 0.0 {
        return Err(format!("factor {} must be an integer in 0..=8", factor));
    }
    let size = match op.param("size") {
        Some(s) => Some(s.parse::<usize>().map_err(|_| format!("size '{}' is not a point count", s))?),
        None => None,
    };
    for v in vectors.iter_mut() {
        let len = v.len();
        let target = size.unwrap_or_else(|| len.next_power_of_two() << factor as u32);
        if target < len {
            return Err(format!("size {} is smaller than the vector ({} points)", target, len));
        }
        let padded: Array1<Complex64> = v
            .data
            .iter()
            .copied()
            .chain(iter::repeat(Complex64::default()).take(target - len))
            .collect();
        v.data = padded;
    }
    Ok(())
}

fn scale(op: &Operation, vectors: &mut [FidVector]) -> Result<(), String> {
    let factor = op.param_f64("factor", 1.0).map_err(|e| e.to_string())?;
    for v in vectors.iter_mut() {
        v.data.mapv_inplace(|z| z * factor);
    }
    Ok(())
}

fn phase(op: &Operation, vectors: &mut [FidVector]) -> Result<(), String> {
    let ph0 = op.param_f64("ph0", 0.0).map_err(|e| e.to_string())?;
    let rotation = Complex64::from_polar(1.0, ph0.to_radians());
    for v in vectors.iter_mut() {
        v.data.mapv_inplace(|z| z * rotation);
    }
    Ok(())
}

fn fail(op: &Operation, _: &mut [FidVector]) -> Result<(), String> {
    Err(op
        .param("message")
        .map(|m| unquote(m).to_string())
        .unwrap_or_else(|| "operation failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::traits::CancelFlag;

    fn vectors(n: usize, len: usize) -> Vec<FidVector> {
        (0..n)
            .map(|i| FidVector::new(Array1::from_elem(len, Complex64::new(1.0, i as f64)), true, vec![i]))
            .collect()
    }

    fn run(engine: &mut DispatchEngine, script: &str, vecs: &mut [FidVector], combined: bool) -> Result<(), NmrProcError> {
        let cancel = CancelFlag::new();
        engine.execute(EngineRequest {
            script,
            vectors: vecs,
            vector_dim: 1,
            combined_with_data_processing: combined,
            cancel: &cancel,
        })
    }

    #[test]
    fn test_builtins_mutate_vectors() {
        let mut engine = DispatchEngine::new();
        let mut vecs = vectors(2, 100);
        run(&mut engine, "DIM(1)\nZF()\nSCALE(factor=2)\nrun()\n", &mut vecs, false).unwrap();
        assert_eq!(vecs[0].len(), 256);
        assert_eq!(vecs[1].data[0], Complex64::new(2.0, 2.0));
        assert_eq!(vecs[1].data[200], Complex64::default());
    }

    #[test]
    fn test_failure_reports_position_in_block() {
        let mut engine = DispatchEngine::new();
        let mut vecs = vectors(1, 8);
        let script = "DIM(1)\nSCALE(factor=2)\nTDCOMB(dim=2,coef=ea)\nFAIL(message='bad lb')\nrun()\n";
        let err = run(&mut engine, script, &mut vecs, false).unwrap_err();
        match err {
            NmrProcError::IncompleteProcessing { op_name, dim_key, op_index, message } => {
                assert_eq!(op_name, "FAIL");
                assert_eq!(dim_key, "D1");
                assert_eq!(op_index, 2);
                assert_eq!(message, "bad lb");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_operation_is_incomplete() {
        let mut engine = DispatchEngine::new();
        let mut vecs = vectors(1, 8);
        let err = run(&mut engine, "DIM(1)\nFT()\nrun()\n", &mut vecs, false).unwrap_err();
        assert_eq!(err.fault_locator(), Some(("D1", 0)));
    }

    #[test]
    fn test_disabled_and_other_dim_blocks_are_skipped() {
        let mut engine = DispatchEngine::new();
        let mut vecs = vectors(1, 8);
        let script = "DIM(1)\nFAIL(disabled=True)\nDIM(2)\nFAIL()\nrun()\n";
        run(&mut engine, script, &mut vecs, false).unwrap();
        assert!(run(&mut engine, script, &mut vecs, true).is_err());
    }

    #[test]
    fn test_user_handler_and_cancellation() {
        let mut engine = DispatchEngine::empty().with_handler("ft", |_, vecs| {
            vecs.iter_mut().for_each(|v| v.data.fill(Complex64::new(7.0, 0.0)));
            Ok(())
        });
        assert!(engine.has_handler("FT"));
        let mut vecs = vectors(1, 4);
        run(&mut engine, "DIM(1)\nFT()\nrun()\n", &mut vecs, false).unwrap();
        assert_eq!(vecs[0].data[3], Complex64::new(7.0, 0.0));

        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = engine.execute(EngineRequest {
            script: "DIM(1)\nFT()\nrun()\n",
            vectors: &mut vecs,
            vector_dim: 1,
            combined_with_data_processing: false,
            cancel: &cancel,
        });
        assert!(matches!(result, Err(NmrProcError::Cancelled)));
    }

    #[test]
    fn test_zf_rejects_shrinking() {
        let mut engine = DispatchEngine::new();
        let mut vecs = vectors(1, 8);
        assert!(run(&mut engine, "DIM(1)\nZF(size=4)\nrun()\n", &mut vecs, false).is_err());
        run(&mut engine, "DIM(1)\nZF(size=12)\nrun()\n", &mut vecs, false).unwrap();
        assert_eq!(vecs[0].len(), 12);
    }
}
