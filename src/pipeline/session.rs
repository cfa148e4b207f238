// In: src/pipeline/session.rs

//! The processing session: owns an opened acquisition, its operation registry
//! and the live/save vector pair, and drives script execution.
//!
//! State flow:
//!
//!   Idle --load_vectors--> Loaded --execute--> Executing --+--> Loaded (processed)
//!                            ^                             |
//!                            +------ Loaded (restored) <---+  on failure or cancel
//!
//! `live` and `save` are parallel lists in load order. Every execution starts
//! from the saved vectors, and any failure copies them back element by element.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use ndarray::Array1;
use num_complex::Complex64;

use crate::config::ProcessorConfig;
use crate::error::NmrProcError;
use crate::indexing::{AxisRole, VecIndex, VectorIndexer};
use crate::pipeline::models::{DimKey, Operation};
use crate::pipeline::registry::{OpListUpdate, OperationRegistry};
use crate::pipeline::script::{BuiltScript, ScriptBuilder, ScriptExtras};
use crate::pipeline::traits::{CancelFlag, EngineRequest, NumericEngine};
use crate::pipeline::vector::FidVector;
use crate::raw::FidSource;
use crate::scan::{scan_for_corruption, ScanReport};
use crate::types::{format_skip_groups, parse_skip_groups, AcqMode, AcquisitionModel, SkipGroup};

//==================================================================================
// 1. Session Types
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No vectors loaded.
    Idle,
    /// Vectors loaded; the registry may be edited.
    Loaded,
    Executing,
}

/// What happens to the registry when a new FID is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistryPolicy {
    /// Keep the registry only when the new FID has the same dataset id.
    #[default]
    SameDatasetOnly,
    /// Keep the registry regardless of dataset.
    Preserve,
}

pub type RenderCallback = Box<dyn FnMut(&[FidVector]) + Send>;

pub struct ProcessingSession {
    config: Arc<ProcessorConfig>,
    engine: Box<dyn NumericEngine>,
    model: Option<AcquisitionModel>,
    indexer: Option<VectorIndexer>,
    source: Option<Box<dyn FidSource>>,
    registry: OperationRegistry,
    skip_groups: Vec<SkipGroup>,
    live: Vec<FidVector>,
    save: Vec<FidVector>,
    /// 1-based acquisition dimension the loaded vectors lie along.
    vector_dim: usize,
    output_dims: Vec<Option<usize>>,
    state: SessionState,
    cancel: CancelFlag,
    render: Option<RenderCallback>,
}

impl ProcessingSession {
    pub fn new(config: Arc<ProcessorConfig>, engine: Box<dyn NumericEngine>) -> Self {
        Self {
            config,
            engine,
            model: None,
            indexer: None,
            source: None,
            registry: OperationRegistry::new(),
            skip_groups: Vec::new(),
            live: Vec::new(),
            save: Vec::new(),
            vector_dim: 1,
            output_dims: Vec::new(),
            state: SessionState::Idle,
            cancel: CancelFlag::new(),
            render: None,
        }
    }

    //==============================================================================
    // 2. Opening & Configuration
    //==============================================================================

    /// Opens a raw acquisition, replacing the current one.
    ///
    /// Nothing is changed when the model is rejected. Loaded vectors are
    /// dropped and the session returns to `Idle`.
    pub fn open_fid(
        &mut self,
        model: AcquisitionModel,
        source: Box<dyn FidSource>,
        policy: RegistryPolicy,
    ) -> Result<(), NmrProcError> {
        if source.points_per_record() != model.points_per_record() {
            return Err(NmrProcError::Configuration(format!(
                "source records hold {} points, acquisition expects {}",
                source.points_per_record(),
                model.points_per_record()
            )));
        }
        if source.record_count() < model.record_count() {
            log::warn!(
                "{}: source has {} records, acquisition describes {}",
                model.dataset_id(),
                source.record_count(),
                model.record_count()
            );
        }

        let same_dataset = self
            .model
            .as_ref()
            .map_or(false, |m| m.dataset_id() == model.dataset_id());
        let keep_registry = same_dataset || policy == RegistryPolicy::Preserve;
        let modes = if keep_registry {
            self.registry.acq_modes(model.ndim())?
        } else {
            vec![AcqMode::default(); model.ndim()]
        };
        let indexer = VectorIndexer::new(&model)?.with_modes(modes);

        if !keep_registry {
            self.registry.clear();
            self.skip_groups.clear();
        }
        log::info!(
            "Opened {} ({}D, sizes {:?}, {} groups), registry {}",
            model.dataset_id(),
            model.ndim(),
            model.sizes(),
            indexer.group_count(),
            if keep_registry { "kept" } else { "reset" }
        );
        self.model = Some(model);
        self.indexer = Some(indexer);
        self.source = Some(source);
        self.live.clear();
        self.save.clear();
        self.output_dims.clear();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Replaces the acquisition order; the indexer is rebuilt on next load.
    pub fn set_acq_order(&mut self, text: &str) -> Result<(), NmrProcError> {
        self.model.as_mut().ok_or_else(no_fid)?.set_acq_order(text)
    }

    pub fn set_render_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&[FidVector]) + Send + 'static,
    {
        self.render = Some(Box::new(callback));
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OperationRegistry {
        &mut self.registry
    }

    pub fn update_op_list(&mut self, key: DimKey, ops: Vec<Operation>) -> OpListUpdate {
        let update = self.registry.update_op_list(key, ops);
        if update == OpListUpdate::Invalidated {
            log::warn!("Primary operation list is empty; auto-processing is off until it is edited");
        }
        update
    }

    pub fn add_skip_group(&mut self, group: SkipGroup) {
        self.skip_groups.push(group);
    }

    pub fn set_skip_groups(&mut self, groups: Vec<SkipGroup>) {
        self.skip_groups = groups;
    }

    pub fn skip_groups(&self) -> &[SkipGroup] {
        &self.skip_groups
    }

    pub fn skip_groups_text(&self) -> String {
        format_skip_groups(&self.skip_groups)
    }

    pub fn set_skip_groups_text(&mut self, text: &str) -> Result<(), NmrProcError> {
        self.skip_groups = parse_skip_groups(text)?;
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn model(&self) -> Option<&AcquisitionModel> {
        self.model.as_ref()
    }

    pub fn live_vectors(&self) -> &[FidVector] {
        &self.live
    }

    pub fn saved_vectors(&self) -> &[FidVector] {
        &self.save
    }

    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }

    /// Output mapping from the most recent script build.
    pub fn output_dims(&self) -> &[Option<usize>] {
        &self.output_dims
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    //==============================================================================
    // 3. Loading Vectors
    //==============================================================================

    /// Loads the vector group producing output `rows` (one coordinate per
    /// non-leading dimension; empty selects the first group).
    ///
    /// Returns the number of vectors installed. On error the previous live set
    /// is left as it was.
    pub fn load_vectors(&mut self, rows: &[usize]) -> Result<usize, NmrProcError> {
        self.ensure_not_executing()?;
        self.refresh_indexer()?;
        let (model, indexer, source) = self.opened()?;

        let group = if rows.is_empty() {
            0
        } else {
            indexer.find_out_group(rows).ok_or_else(|| {
                NmrProcError::Configuration(format!("rows {:?} are outside the acquisition", rows))
            })?
        };
        let index = indexer
            .get_next_group(group)
            .ok_or_else(|| NmrProcError::Configuration(format!("group {} does not exist", group)))?;

        let mut vectors = read_group(model, source, &self.skip_groups, &index)?;
        combine_echo_antiecho(model, indexer, &index, &mut vectors);
        log::debug!("Loaded group {} ({} vectors) for rows {:?}", group, vectors.len(), rows);
        Ok(self.install(vectors, 1))
    }

    /// Loads vectors along indirect dimension `dim` (1-based) at direct point
    /// `point`, with the other non-leading dimensions fixed at `increments`.
    ///
    /// A phase-pair dimension yields two vectors, built from the real and the
    /// imaginary part of the direct point.
    pub fn load_vectors_along(&mut self, dim: usize, point: usize, increments: &[usize]) -> Result<usize, NmrProcError> {
        self.ensure_not_executing()?;
        self.refresh_indexer()?;
        let (model, indexer, source) = self.opened()?;

        if dim < 2 || dim > model.ndim() {
            return Err(NmrProcError::Configuration(format!(
                "dimension {} is not an indirect dimension of a {}D acquisition",
                dim,
                model.ndim()
            )));
        }
        if model.array_sizes()[dim - 1] > 0 {
            return Err(NmrProcError::Configuration(format!(
                "dimension {} is arrayed; load its rows instead",
                dim
            )));
        }
        if point >= model.points_per_record() {
            return Err(NmrProcError::Configuration(format!(
                "point {} is beyond the {} points of a record",
                point,
                model.points_per_record()
            )));
        }
        let phases = model.group_size(dim - 1);
        if phases > 2 {
            return Err(NmrProcError::Configuration(format!(
                "dimension {} has {} phases; only pairs are supported",
                dim, phases
            )));
        }
        let axis = indexer
            .synthetic_dims()
            .iter()
            .position(|s| s.role == AxisRole::Delay && s.dim == dim)
            .ok_or_else(|| NmrProcError::InternalError(format!("no delay axis for dimension {}", dim)))?;
        let size = indexer.synthetic_dims()[axis].size;

        let mut buffer = vec![Complex64::default(); model.points_per_record()];
        let mut incs = increments.to_vec();
        let mut values: Vec<[Complex64; 2]> = Vec::with_capacity(size);
        let mut acquired = true;
        for k in 0..size {
            if let Some(slot) = incs.get_mut(axis) {
                *slot = k;
            }
            let index = indexer.index_for_increments(&incs).ok_or_else(|| {
                NmrProcError::Configuration(format!("increments {:?} are outside the acquisition", increments))
            })?;
            let mut pair = [Complex64::default(); 2];
            for (phase, value) in pair.iter_mut().enumerate().take(phases) {
                let mut wanted = vec![0; model.ndim()];
                wanted[dim - 1] = phase;
                let constituent = index.constituent_with_phases(&wanted).ok_or_else(|| {
                    NmrProcError::InternalError(format!("no constituent with phases {:?}", wanted))
                })?;
                if !index.is_acquired() || is_skipped(&self.skip_groups, &index, constituent) {
                    acquired &= index.is_acquired();
                    continue;
                }
                source.read_record(index.in_vec(constituent), &mut buffer)?;
                *value = buffer[point];
            }
            if let AcqMode::EchoAntiecho { coef_a, coef_b } = indexer.mode(dim - 1) {
                if phases == 2 {
                    let (e, a) = (pair[0], pair[1]);
                    pair = [(e + a) * coef_a, Complex64::i() * (a - e) * coef_b];
                }
            }
            values.push(pair);
        }

        let vectors: Vec<FidVector> = if phases == 2 {
            let re: Array1<Complex64> = values.iter().map(|p| Complex64::new(p[0].re, p[1].re)).collect();
            let im: Array1<Complex64> = values.iter().map(|p| Complex64::new(p[0].im, p[1].im)).collect();
            vec![
                FidVector { data: re, complex: true, rows: increments.to_vec(), acquired },
                FidVector { data: im, complex: true, rows: increments.to_vec(), acquired },
            ]
        } else {
            let data: Array1<Complex64> = values.iter().map(|p| p[0]).collect();
            vec![FidVector { data, complex: false, rows: increments.to_vec(), acquired }]
        };
        log::debug!("Loaded {} vectors along D{} at point {}", vectors.len(), dim, point);
        Ok(self.install(vectors, dim))
    }

    fn install(&mut self, vectors: Vec<FidVector>, vector_dim: usize) -> usize {
        // The snapshot is taken before anything can mutate the live set.
        self.save = vectors.clone();
        self.live = vectors;
        self.vector_dim = vector_dim;
        self.state = SessionState::Loaded;
        self.live.len()
    }

    fn refresh_indexer(&mut self) -> Result<(), NmrProcError> {
        let model = self.model.as_ref().ok_or_else(no_fid)?;
        let modes = self.registry.acq_modes(model.ndim())?;
        let stale = self.indexer.as_ref().map_or(true, |ix| !ix.is_current_for(model));
        if stale {
            log::debug!("Acquisition layout changed; rebuilding indexer");
            self.indexer = Some(VectorIndexer::new(model)?);
        }
        if let Some(indexer) = self.indexer.as_mut() {
            indexer.set_modes(modes);
        }
        Ok(())
    }

    fn opened(&self) -> Result<(&AcquisitionModel, &VectorIndexer, &dyn FidSource), NmrProcError> {
        match (&self.model, &self.indexer, &self.source) {
            (Some(model), Some(indexer), Some(source)) => Ok((model, indexer, source.as_ref())),
            _ => Err(no_fid()),
        }
    }

    fn ensure_not_executing(&self) -> Result<(), NmrProcError> {
        if self.state == SessionState::Executing {
            return Err(NmrProcError::InvalidState("an execution is in progress".to_string()));
        }
        Ok(())
    }

    //==============================================================================
    // 4. Execution
    //==============================================================================

    /// Runs `script` over the loaded vectors.
    ///
    /// On success the processed vectors stay live and the render callback is
    /// notified. On any failure, cancellation included, the live vectors are
    /// restored from the saved set and the error is returned; the registry is
    /// never touched.
    pub fn execute(&mut self, script: &str, combined_with_data_processing: bool) -> Result<(), NmrProcError> {
        match self.state {
            SessionState::Loaded => {}
            SessionState::Idle => return Err(NmrProcError::InvalidState("no vectors are loaded".to_string())),
            SessionState::Executing => return Err(NmrProcError::InvalidState("an execution is in progress".to_string())),
        }
        self.restore();
        self.state = SessionState::Executing;
        log::info!(
            "Executing script on {} vectors along D{} (combined: {})",
            self.live.len(),
            self.vector_dim,
            combined_with_data_processing
        );

        let start = Instant::now();
        let result = if self.cancel.is_cancelled() {
            Err(NmrProcError::Cancelled)
        } else {
            timed!(
                "engine execution",
                self.engine.execute(EngineRequest {
                    script,
                    vectors: &mut self.live,
                    vector_dim: self.vector_dim,
                    combined_with_data_processing,
                    cancel: &self.cancel,
                })
            )
        };
        self.cancel.reset();
        self.state = SessionState::Loaded;

        match result {
            Ok(()) => {
                log::info!("Processing finished in {:?}", start.elapsed());
                if let Some(render) = self.render.as_mut() {
                    render(&self.live);
                }
                Ok(())
            }
            Err(err) => {
                self.restore();
                match err.fault_locator() {
                    Some((key, index)) => log::warn!("Processing stopped at {}[{}]; vectors restored: {}", key, index, err),
                    None => log::warn!("Processing failed; vectors restored: {}", err),
                }
                Err(err)
            }
        }
    }

    /// Builds the display script from the registry and executes it.
    pub fn process(&mut self, combined_with_data_processing: bool) -> Result<BuiltScript, NmrProcError> {
        let model = self.model.as_ref().ok_or_else(no_fid)?;
        let built = ScriptBuilder::new(Arc::clone(&self.config)).build_for_display(model, &self.registry);
        self.output_dims = built.output_dims.clone();
        self.execute(&built.text, combined_with_data_processing)?;
        Ok(built)
    }

    /// Builds the full execution script for the opened FID.
    pub fn build_script(
        &mut self,
        fid_path: &std::path::Path,
        output: Option<&std::path::Path>,
        extras: &ScriptExtras,
    ) -> Result<BuiltScript, NmrProcError> {
        let model = self.model.as_ref().ok_or_else(no_fid)?;
        let built = ScriptBuilder::new(Arc::clone(&self.config)).build_for_execution(
            model,
            &self.registry,
            fid_path,
            output,
            extras,
        )?;
        self.output_dims = built.output_dims.clone();
        Ok(built)
    }

    /// Moves the session to a worker thread and executes `script` there.
    ///
    /// The session comes back from [`ExecutionHandle::join`], so no other
    /// load or execute can overlap the run.
    pub fn execute_in_background(self, script: String, combined_with_data_processing: bool) -> ExecutionHandle {
        let cancel = self.cancel.clone();
        let handle = thread::spawn(move || {
            let mut session = self;
            let result = session.execute(&script, combined_with_data_processing);
            (session, result)
        });
        ExecutionHandle { cancel, handle }
    }

    /// Copies every saved vector back over its live counterpart.
    fn restore(&mut self) {
        assert_eq!(
            self.live.len(),
            self.save.len(),
            "live and saved vector lists diverged"
        );
        for (live, saved) in self.live.iter_mut().zip(&self.save) {
            live.clone_from(saved);
        }
    }

    //==============================================================================
    // 5. Scanning
    //==============================================================================

    /// Scans the opened FID with the configured ratio and result limit.
    pub fn scan_for_corruption(&self) -> Result<ScanReport, NmrProcError> {
        self.scan_with(self.config.scan.ratio, self.config.scan.max_results)
    }

    /// Scans with a fresh indexer and buffers; live vectors are not touched.
    pub fn scan_with(&self, ratio: f64, max_results: usize) -> Result<ScanReport, NmrProcError> {
        let model = self.model.as_ref().ok_or_else(no_fid)?;
        let source = self.source.as_deref().ok_or_else(no_fid)?;
        let indexer = VectorIndexer::new(model)?;
        scan_for_corruption(&indexer, source, ratio, max_results)
    }
}

//==================================================================================
// 6. Background Execution Handle
//==================================================================================

pub struct ExecutionHandle {
    cancel: CancelFlag,
    handle: JoinHandle<(ProcessingSession, Result<(), NmrProcError>)>,
}

impl ExecutionHandle {
    /// Asks the engine to stop at its next operation boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the run and hands the session back with its result.
    ///
    /// A cancel request that arrives after the run finished is discarded.
    pub fn join(self) -> (ProcessingSession, Result<(), NmrProcError>) {
        match self.handle.join() {
            Ok(outcome) => {
                self.cancel.reset();
                outcome
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

//==================================================================================
// 7. Group Assembly Helpers
//==================================================================================

fn no_fid() -> NmrProcError {
    NmrProcError::InvalidState("no FID is open".to_string())
}

fn is_skipped(skip_groups: &[SkipGroup], index: &VecIndex, constituent: usize) -> bool {
    let phase = index.phases(constituent).get(1).copied().unwrap_or(0);
    skip_groups
        .iter()
        .any(|g| g.matches(index.increments()) && g.skips_component(phase))
}

/// Reads every constituent of `index`, zero-filling records that were not
/// acquired or that a skip group covers.
fn read_group(
    model: &AcquisitionModel,
    source: &dyn FidSource,
    skip_groups: &[SkipGroup],
    index: &VecIndex,
) -> Result<Vec<FidVector>, NmrProcError> {
    let points = model.points_per_record();
    let complex = model.is_complex(0);
    let mut buffer = vec![Complex64::default(); points];
    (0..index.len())
        .map(|j| {
            let rows = index.out_vec(j).to_vec();
            if !index.is_acquired() || is_skipped(skip_groups, index, j) {
                return Ok(FidVector::zeros(points, complex, rows));
            }
            source.read_record(index.in_vec(j), &mut buffer)?;
            Ok(FidVector::new(Array1::from(buffer.clone()), complex, rows))
        })
        .collect()
}

/// Combines echo/anti-echo pairs in place for every dimension in that mode:
/// `out0 = a·(e + r)`, `out1 = b·i·(r − e)`.
fn combine_echo_antiecho(model: &AcquisitionModel, indexer: &VectorIndexer, index: &VecIndex, vectors: &mut [FidVector]) {
    for dim in 1..model.ndim() {
        let AcqMode::EchoAntiecho { coef_a, coef_b } = indexer.mode(dim) else {
            continue;
        };
        if model.group_size(dim) != 2 {
            log::warn!("Echo-antiecho on dimension {} needs a phase pair; left uncombined", dim + 1);
            continue;
        }
        for j in 0..index.len() {
            if index.phase(j, dim) != 0 {
                continue;
            }
            let mut partner = index.phases(j).to_vec();
            partner[dim] = 1;
            let Some(k) = index.constituent_with_phases(&partner) else {
                continue;
            };
            let echo = vectors[j].data.clone();
            let antiecho = vectors[k].data.clone();
            vectors[j].data = (&echo + &antiecho) * coef_a;
            vectors[k].data = (&antiecho - &echo) * Complex64::new(0.0, coef_b);
        }
    }
}
