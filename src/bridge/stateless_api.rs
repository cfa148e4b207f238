// In: src/bridge/stateless_api.rs

use std::path::Path;
use std::sync::Arc;

use crate::bridge::format::ScriptStats;
use crate::config::ProcessorConfig;
use crate::error::NmrProcError;
use crate::indexing::VectorIndexer;
use crate::pipeline::script::{parse_script, resolve_dataset_placeholder, BuiltScript, CreateTarget, ScriptBuilder, ScriptExtras};
use crate::pipeline::OperationRegistry;
use crate::raw::{BinaryFid, FidSource};
use crate::scan::{scan_for_corruption, ScanReport};
use crate::types::AcquisitionModel;

/// Builds the full execution script for `model` with the given config.
///
/// Without an `output` path the `CREATE` directive keeps the configured
/// placeholder; call [`resolve_output_path`] once the dataset path is known.
pub fn build_execution_script(
    config: Arc<ProcessorConfig>,
    model: &AcquisitionModel,
    registry: &OperationRegistry,
    fid_path: &Path,
    output: Option<&Path>,
) -> Result<BuiltScript, NmrProcError> {
    ScriptBuilder::new(config).build_for_execution(model, registry, fid_path, output, &ScriptExtras::default())
}

/// Builds the header-less display script with the default config.
pub fn build_display_script(model: &AcquisitionModel, registry: &OperationRegistry) -> BuiltScript {
    let default_config = Arc::new(ProcessorConfig::default());
    ScriptBuilder::new(default_config).build_for_display(model, registry)
}

/// Substitutes `output` for the configured placeholder in `script`.
pub fn resolve_output_path(config: &ProcessorConfig, script: &str, output: &Path) -> Result<String, NmrProcError> {
    resolve_dataset_placeholder(script, &config.script.dataset_placeholder, output)
}

/// Summarizes a script without executing it.
pub fn analyze_script(script: &str) -> Result<ScriptStats, NmrProcError> {
    // 1. Parse; this also validates the `run()` terminator.
    let parsed = parse_script(script)?;

    // 2. Count what the engine would see.
    let (enabled_ops, disabled_ops) = parsed
        .blocks
        .iter()
        .flat_map(|(_, ops)| ops.iter())
        .fold((0, 0), |(on, off), op| if op.is_disabled() { (on, off + 1) } else { (on + 1, off) });
    let line_count = script
        .lines()
        .position(|l| l.trim().starts_with("run("))
        .map_or(0, |i| i + 1);

    Ok(ScriptStats {
        line_count,
        block_count: parsed.blocks.len(),
        keys: parsed.registry.keys().iter().map(|k| k.to_string()).collect(),
        enabled_ops,
        disabled_ops,
        has_placeholder: matches!(parsed.create, Some(CreateTarget::Placeholder(_))),
    })
}

/// Opens a raw FID file with the configured layout and scans it for
/// corrupted groups.
pub fn scan_fid_file(config: &ProcessorConfig, model: &AcquisitionModel, path: &Path) -> Result<ScanReport, NmrProcError> {
    let fid = BinaryFid::open(path, model.points_per_record(), model.is_complex(0), config.raw.clone())?;
    if fid.record_count() < model.record_count() {
        return Err(NmrProcError::Configuration(format!(
            "{} holds {} records, acquisition needs {}",
            path.display(),
            fid.record_count(),
            model.record_count()
        )));
    }
    let indexer = VectorIndexer::new(model)?;
    scan_for_corruption(&indexer, &fid, config.scan.ratio, config.scan.max_results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn model_2d() -> AcquisitionModel {
        AcquisitionModel::new("exp", vec![4, 8], vec![true, true], vec![1, 2]).unwrap()
    }

    #[test]
    fn test_analyze_script_after_building() {
        // 1. Arrange: a registry with one disabled operation.
        let mut registry = OperationRegistry::new();
        registry.put_text("D1", &["SCALE(factor=2)", "ZF(disabled=True)"]).unwrap();
        registry.put_text("D2", &["PHASE(ph0=90)"]).unwrap();
        let config = Arc::new(ProcessorConfig::default());

        // 2. Act: build with the placeholder, then analyze.
        let built = build_execution_script(Arc::clone(&config), &model_2d(), &registry, Path::new("/data/fid"), None).unwrap();
        let stats = analyze_script(&built.text).unwrap();

        // 3. Assert
        assert_eq!(stats.block_count, 2);
        assert_eq!(stats.keys, vec!["D1", "D2"]);
        assert_eq!(stats.enabled_ops, 2);
        assert_eq!(stats.disabled_ops, 1);
        assert!(stats.has_placeholder);
        assert_eq!(stats.line_count, built.text.lines().count());

        // 4. Act: resolve the output and analyze again.
        let resolved = resolve_output_path(&config, &built.text, Path::new("/data/out.nv")).unwrap();
        assert!(!analyze_script(&resolved).unwrap().has_placeholder);
    }

    #[test]
    fn test_display_script_has_no_header() {
        let mut registry = OperationRegistry::new();
        registry.put_text("D1", &["SCALE(factor=2)"]).unwrap();
        let built = build_display_script(&model_2d(), &registry);
        assert_eq!(built.text, "DIM(1)\nSCALE(factor=2)\nrun()\n");
        assert_eq!(built.output_dims, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_scan_fid_file_finds_spiked_record() {
        let path = std::env::temp_dir().join(format!("nmrproc_scan_{}.fid", std::process::id()));
        let mut bytes = Vec::new();
        for record in 0..16 {
            for point in 0..4 {
                let re: f32 = if record == 9 && point == 2 { 80.0 } else { 3.0 };
                bytes.extend_from_slice(&re.to_le_bytes());
                bytes.extend_from_slice(&4.0f32.to_le_bytes());
            }
        }
        File::create(&path).unwrap().write_all(&bytes).unwrap();

        let report = scan_fid_file(&ProcessorConfig::default(), &model_2d(), &path).unwrap();
        assert_eq!(report.groups_scanned, 8);
        assert_eq!(report.outliers.len(), 1);
        assert_eq!(report.outliers[0].group, 4);
        assert_eq!(report.outliers[0].constituent, 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_analyze_rejects_unterminated_script() {
        assert!(matches!(
            analyze_script("DIM(1)\nSCALE()\n"),
            Err(NmrProcError::ScriptSyntax { .. })
        ));
    }
}
