use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::NmrProcError;
use crate::indexing::{NusSchedule, VectorIndexer};
use crate::raw::MemoryFid;
use crate::scan::scan_for_corruption;
use crate::types::AcquisitionModel;

// Test Helpers
/// A 2D acquisition with `increments` groups of two records each.
fn paired_model(increments: usize) -> AcquisitionModel {
    AcquisitionModel::new("scan", vec![32, increments], vec![true, true], vec![1, 2]).unwrap()
}

/// Records whose every point has magnitude 10, except the listed records
/// which get a single spike of magnitude 100.
fn fid_with_spikes(records: usize, spikes: &[usize]) -> MemoryFid {
    MemoryFid::from_fn(records, 32, true, |r, p| {
        if p == 5 && spikes.contains(&r) {
            Complex64::new(0.0, 100.0)
        } else {
            Complex64::new(6.0, 8.0)
        }
    })
}

#[test]
fn test_single_corrupted_constituent_is_flagged() {
    let model = paired_model(10);
    let indexer = VectorIndexer::new(&model).unwrap();
    // Group 7, constituent 1 is record 15.
    let fid = fid_with_spikes(20, &[15]);

    let report = scan_for_corruption(&indexer, &fid, 3.0, 20).unwrap();
    assert_eq!(report.groups_scanned, 10);
    assert!((report.mean - 14.5).abs() < 1e-9);
    assert!(report.threshold > 10.0 && report.threshold < 100.0);
    assert_eq!(report.outliers.len(), 1);

    let hit = &report.outliers[0];
    assert_eq!(hit.group, 7);
    assert_eq!(hit.increments, vec![7]);
    assert_eq!(hit.constituent, 1);
    assert_eq!(hit.score, 100.0);
}

#[test]
fn test_noisy_acquisition_flags_only_the_spike() {
    let model = paired_model(50);
    let indexer = VectorIndexer::new(&model).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let peaks: Vec<f64> = (0..100).map(|_| rng.random_range(9.0..11.0)).collect();
    let fid = MemoryFid::from_fn(100, 32, true, |r, p| match (r, p) {
        (61, 0) => Complex64::new(100.0, 0.0),
        (_, 0) => Complex64::new(peaks[r], 0.0),
        _ => Complex64::new(0.5, -0.5),
    });

    let report = scan_for_corruption(&indexer, &fid, 3.0, 20).unwrap();
    let groups: Vec<usize> = report.outliers.iter().map(|s| s.group).collect();
    assert_eq!(groups, vec![30]);
    assert_eq!(report.outliers[0].constituent, 1);
}

#[test]
fn test_ties_order_by_constituent_and_respect_max_results() {
    let model = paired_model(40);
    let indexer = VectorIndexer::new(&model).unwrap();
    // Group 3 constituent 1 (record 7) and group 5 constituent 0 (record 10).
    let fid = fid_with_spikes(80, &[7, 10]);

    let report = scan_for_corruption(&indexer, &fid, 3.0, 20).unwrap();
    let hits: Vec<(usize, usize)> = report.outliers.iter().map(|s| (s.group, s.constituent)).collect();
    assert_eq!(hits, vec![(5, 0), (3, 1)]);

    let limited = scan_for_corruption(&indexer, &fid, 3.0, 1).unwrap();
    assert_eq!(limited.outliers.len(), 1);
    assert_eq!(limited.outliers[0].group, 5);
}

#[test]
fn test_uniform_acquisition_has_no_outliers() {
    let model = paired_model(10);
    let indexer = VectorIndexer::new(&model).unwrap();
    let fid = fid_with_spikes(20, &[]);
    let report = scan_for_corruption(&indexer, &fid, 3.0, 20).unwrap();
    assert_eq!(report.std_dev, 0.0);
    assert!(report.outliers.is_empty());
}

#[test]
fn test_nus_gaps_are_not_scored() {
    let schedule = NusSchedule::new(vec![vec![0], vec![2], vec![4], vec![6]]).unwrap();
    let model = AcquisitionModel::new("nus", vec![32, 8], vec![true, true], vec![1, 1])
        .unwrap()
        .with_nus(schedule)
        .unwrap();
    let indexer = VectorIndexer::new(&model).unwrap();
    let fid = fid_with_spikes(4, &[]);
    let report = scan_for_corruption(&indexer, &fid, 3.0, 20).unwrap();
    assert_eq!(report.groups_scanned, 4);
}

#[test]
fn test_short_source_aborts_the_scan() {
    let model = paired_model(10);
    let indexer = VectorIndexer::new(&model).unwrap();
    let fid = fid_with_spikes(12, &[]);
    let result = scan_for_corruption(&indexer, &fid, 3.0, 20);
    assert!(matches!(result, Err(NmrProcError::Io(_))));
}
