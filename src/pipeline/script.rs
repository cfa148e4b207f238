// In: src/pipeline/script.rs

//! Serialization of an acquisition and its operation registry into the
//! line-oriented pipeline script, and the parser for the same text.
//!
//! An execution script has three parts:
//! 1. Header: setup lines, `FID(...)`, `CREATE(...)`, acquisition directives
//!    derived from the model, then caller-supplied reference text and the
//!    registry's header operations.
//! 2. Body: one `DIM(...)`/`PDIM(...)` block per non-empty registry entry, in
//!    dimension-key order.
//! 3. Footer: `run()`.
//!
//! A display script is the body and footer only.

use std::path::Path;
use std::sync::Arc;

use crate::bridge::format::{
    CREATE_DIRECTIVE, DIM_DIRECTIVE, FID_DIRECTIVE, PDIM_DIRECTIVE, PROC_OPTS_DIRECTIVE,
    RESERVED_HEADER_KEYS, RUN_DIRECTIVE,
};
use crate::config::ProcessorConfig;
use crate::error::NmrProcError;
use crate::pipeline::models::{unquote, DimKey, DimKind, Operation};
use crate::pipeline::registry::OperationRegistry;
use crate::types::AcquisitionModel;
use crate::utils::{absolute_path, script_path_string};

//==================================================================================
// 1. Builder Types
//==================================================================================

/// Caller-supplied text inserted into the header of an execution script.
#[derive(Debug, Clone, Default)]
pub struct ScriptExtras {
    /// Reference and calibration directives, one per line.
    pub reference_text: Option<String>,
    /// Lineshape-catalog fragment appended after the header operations.
    pub lineshape_catalog: Option<String>,
}

/// A built script plus the dimension mapping computed while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltScript {
    pub text: String,
    /// Output dataset position of each acquisition dimension; `None` when the
    /// dimension is skipped.
    pub output_dims: Vec<Option<usize>>,
}

pub struct ScriptBuilder {
    config: Arc<ProcessorConfig>,
}

impl ScriptBuilder {
    pub fn new(config: Arc<ProcessorConfig>) -> Self {
        Self { config }
    }

    pub fn placeholder(&self) -> &str {
        &self.config.script.dataset_placeholder
    }

    /// Builds the full script the engine runs.
    ///
    /// With no `output` path the `CREATE` directive carries the dataset
    /// placeholder; see [`resolve_dataset_placeholder`].
    pub fn build_for_execution(
        &self,
        model: &AcquisitionModel,
        registry: &OperationRegistry,
        fid_path: &Path,
        output: Option<&Path>,
        extras: &ScriptExtras,
    ) -> Result<BuiltScript, NmrProcError> {
        let output_dims = output_dim_mapping(model, registry);
        let mut text = String::new();

        for line in &self.config.script.imports {
            push_line(&mut text, line);
        }
        if let Some(options) = &self.config.script.process_options {
            push_line(&mut text, options);
        }

        let fid = script_path_string(&absolute_path(fid_path)?);
        push_line(&mut text, &format!("{}('{}')", FID_DIRECTIVE, fid));
        let target = match output {
            Some(path) => format!("'{}'", script_path_string(&absolute_path(path)?)),
            None => self.placeholder().to_string(),
        };
        push_line(&mut text, &format!("{}({})", CREATE_DIRECTIVE, target));

        for line in model_directives(model, &output_dims) {
            push_line(&mut text, &line);
        }
        if let Some(reference) = &extras.reference_text {
            for line in reference.lines().map(str::trim).filter(|l| !l.is_empty()) {
                push_line(&mut text, line);
            }
        }
        for op in registry.header() {
            push_line(&mut text, &op.to_string());
        }
        if let Some(catalog) = &extras.lineshape_catalog {
            for line in catalog.lines().filter(|l| !l.trim().is_empty()) {
                push_line(&mut text, line);
            }
        }

        write_body(&mut text, registry);
        log::debug!(
            "Built execution script: {} lines, output dims {:?}",
            text.lines().count(),
            output_dims
        );
        Ok(BuiltScript { text, output_dims })
    }

    /// Builds the header-less form shown in an editor.
    pub fn build_for_display(&self, model: &AcquisitionModel, registry: &OperationRegistry) -> BuiltScript {
        let mut text = String::new();
        write_body(&mut text, registry);
        BuiltScript {
            text,
            output_dims: output_dim_mapping(model, registry),
        }
    }
}

/// The `DIM` block for a single registry key, or `None` when the key has no
/// operations.
pub fn build_dim_fragment(registry: &OperationRegistry, key: &DimKey) -> Option<String> {
    let ops = registry.get(key).filter(|ops| !ops.is_empty())?;
    let mut text = String::new();
    write_block(&mut text, key, ops);
    Some(text)
}

/// Maps acquisition dimensions to output dataset positions, dropping every
/// dimension whose `D<k>` list holds an enabled `SKIP`.
pub fn output_dim_mapping(model: &AcquisitionModel, registry: &OperationRegistry) -> Vec<Option<usize>> {
    let mut next = 0;
    (1..=model.ndim())
        .map(|dim| {
            if registry.is_dim_skipped(dim) {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect()
}

/// Replaces the output placeholder with the quoted absolute `path`.
///
/// A script that no longer contains the placeholder is returned unchanged.
pub fn resolve_dataset_placeholder(script: &str, placeholder: &str, path: &Path) -> Result<String, NmrProcError> {
    if placeholder.is_empty() || !script.contains(placeholder) {
        return Ok(script.to_string());
    }
    let resolved = format!("'{}'", script_path_string(&absolute_path(path)?));
    Ok(script.replace(placeholder, &resolved))
}

fn push_line(text: &mut String, line: &str) {
    text.push_str(line);
    text.push('\n');
}

fn write_body(text: &mut String, registry: &OperationRegistry) {
    for (key, ops) in registry.iter() {
        if !ops.is_empty() {
            write_block(text, key, ops);
        }
    }
    push_line(text, &format!("{}()", RUN_DIRECTIVE));
}

fn write_block(text: &mut String, key: &DimKey, ops: &[Operation]) {
    let dims: Vec<String> = key.dims().iter().map(usize::to_string).collect();
    let directive = match key.kind() {
        DimKind::Post => PDIM_DIRECTIVE,
        DimKind::Dataset | DimKind::All => DIM_DIRECTIVE,
    };
    push_line(text, &format!("{}({})", directive, dims.join(",")));
    for op in ops {
        push_line(text, &op.to_string());
    }
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Header directives describing the acquisition itself.
fn model_directives(model: &AcquisitionModel, output_dims: &[Option<usize>]) -> Vec<String> {
    let mut lines = Vec::new();
    let order = model.acq_order().to_string();
    if !order.is_empty() {
        lines.push(format!("acqOrder('{}')", order));
    }
    if model.is_arrayed() {
        lines.push(format!("acqarray({})", join(model.array_sizes())));
    }
    lines.push(format!("acqsize({})", join(model.sizes())));
    if let Some(schedule) = model.nus() {
        // Extent of the sampled grid in each indirect dimension.
        let mut extent = vec![0; schedule.arity()];
        for entry in schedule.entries() {
            for (e, &i) in extent.iter_mut().zip(entry) {
                *e = (*e).max(i + 1);
            }
        }
        lines.push(format!("tdsize({},{})", model.size(0), join(extent)));
    }

    let params = model.dim_params();
    if params.iter().any(|p| p.sw > 0.0) {
        lines.push(format!("sw({})", join(params.iter().map(|p| p.sw))));
        lines.push(format!("sf({})", join(params.iter().map(|p| p.sf))));
        lines.push(format!(
            "ref({})",
            join(params.iter().map(|p| p.reference.map_or_else(|| "None".to_string(), |r| r.to_string())))
        ));
        lines.push(format!(
            "label({})",
            join(params.iter().map(|p| format!("'{}'", p.label)))
        ));
    }
    if model.fixdsp() {
        lines.push("fixdsp(True)".to_string());
    }
    if output_dims.iter().any(Option::is_none) {
        lines.push(format!(
            "skip({})",
            join(output_dims.iter().map(|d| if d.is_none() { 1 } else { 0 }))
        ));
    }
    lines
}

//==================================================================================
// 2. Parsing
//==================================================================================

/// Where the engine writes its output dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateTarget {
    Path(String),
    /// The output path is still the unresolved placeholder token.
    Placeholder(String),
}

/// A script read back into its typed parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScript {
    pub fid: Option<String>,
    pub create: Option<CreateTarget>,
    /// Reserved acquisition directives (`acqOrder`, `sw`, `skip`, ...).
    pub directives: Vec<Operation>,
    /// Header operations plus every block's operations, merged per key.
    pub registry: OperationRegistry,
    /// Blocks in the order they appear in the text.
    pub blocks: Vec<(DimKey, Vec<Operation>)>,
}

/// Parses a script produced by [`ScriptBuilder`] (or written by hand in the
/// same grammar). Text after `run()` is ignored.
pub fn parse_script(text: &str) -> Result<ParsedScript, NmrProcError> {
    let mut parsed = ParsedScript::default();
    let mut seen_run = false;
    let mut line_count = 0;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        line_count = line_no;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("import ") || line.starts_with("from ") {
            continue;
        }
        let op = Operation::parse(line).map_err(|e| at_line(e, line_no))?;

        match op.name() {
            RUN_DIRECTIVE => {
                seen_run = true;
                break;
            }
            PROC_OPTS_DIRECTIVE => {}
            FID_DIRECTIVE => parsed.fid = op.positional(0).map(|p| unquote(p).to_string()),
            CREATE_DIRECTIVE => {
                parsed.create = op.positional(0).map(|p| {
                    let inner = unquote(p);
                    if inner.len() == p.trim().len() {
                        CreateTarget::Placeholder(inner.to_string())
                    } else {
                        CreateTarget::Path(inner.to_string())
                    }
                })
            }
            DIM_DIRECTIVE | PDIM_DIRECTIVE => {
                let key = block_key(&op).map_err(|e| at_line(e, line_no))?;
                parsed.blocks.push((key, Vec::new()));
            }
            _ => match parsed.blocks.last_mut() {
                Some((_, ops)) => ops.push(op),
                None if RESERVED_HEADER_KEYS.contains(&op.name()) => parsed.directives.push(op),
                None => parsed.registry.push_header(op),
            },
        }
    }

    if !seen_run {
        return Err(NmrProcError::ScriptSyntax {
            line: line_count,
            message: format!("script does not end with {}()", RUN_DIRECTIVE),
        });
    }

    for (key, ops) in &parsed.blocks {
        match parsed.registry.get_mut(key) {
            Some(existing) => existing.extend(ops.iter().cloned()),
            None => parsed.registry.put(key.clone(), ops.clone()),
        }
    }
    Ok(parsed)
}

fn block_key(op: &Operation) -> Result<DimKey, NmrProcError> {
    if op.params().iter().any(|(k, _)| !k.is_empty()) {
        return Err(NmrProcError::ScriptSyntax {
            line: 0,
            message: format!("{} takes dimension numbers only", op),
        });
    }
    let dims: Vec<&str> = op.params().iter().map(|(_, v)| v.as_str()).collect();
    let key = match (op.name(), dims.is_empty()) {
        (DIM_DIRECTIVE, true) => DimKey::ALL.to_string(),
        (DIM_DIRECTIVE, false) => format!("D{}", dims.join(",")),
        (_, _) => format!("P{}", dims.join(",")),
    };
    DimKey::parse(&key).map_err(|e| NmrProcError::ScriptSyntax {
        line: 0,
        message: e.to_string(),
    })
}

fn at_line(err: NmrProcError, line: usize) -> NmrProcError {
    match err {
        NmrProcError::ScriptSyntax { message, .. } => NmrProcError::ScriptSyntax { line, message },
        other => other,
    }
}
