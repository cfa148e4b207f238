// In: src/scan/corruption.rs

//! Outlier detection over every vector group of an acquisition.
//!
//! The scan reads each constituent record once, into a buffer of its own, and
//! scores it by its peak magnitude. Every constituent score feeds the running
//! statistics; a group's score is its highest constituent score.

use std::cmp::Ordering;
use std::time::Instant;

use num_complex::Complex64;

use crate::error::NmrProcError;
use crate::indexing::VectorIndexer;
use crate::raw::FidSource;
use crate::scan::stats::RunningStats;

/// The score of one vector group.
#[derive(Debug, Clone, PartialEq)]
pub struct VecIndexScore {
    /// Outer group number.
    pub group: usize,
    /// Logical increments of the group's non-leading dimensions.
    pub increments: Vec<usize>,
    /// Constituent that reached the peak.
    pub constituent: usize,
    pub score: f64,
}

/// Summary of one scan pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
    pub groups_scanned: usize,
    /// Scores above the threshold, highest first, at most `max_results`.
    pub outliers: Vec<VecIndexScore>,
}

/// Largest point magnitude in `points`, with NaN treated as zero.
fn peak_magnitude(points: &[Complex64]) -> f64 {
    points
        .iter()
        .map(|z| z.norm())
        .map(|m| if m.is_nan() { 0.0 } else { m })
        .fold(0.0, f64::max)
}

/// Scores every group reachable from `indexer` and reports the outliers.
///
/// `threshold = mean + ratio * std_dev` over all constituent scores: the
/// statistics pool every constituent's peak, not one value per group. Groups
/// a NUS schedule did not acquire are skipped. A failed read aborts the pass.
pub fn scan_for_corruption(
    indexer: &VectorIndexer,
    source: &dyn FidSource,
    ratio: f64,
    max_results: usize,
) -> Result<ScanReport, NmrProcError> {
    let start = Instant::now();
    let mut buffer = vec![Complex64::default(); source.points_per_record()];
    let mut stats = RunningStats::new();
    let mut scores = Vec::new();

    let mut group = 0;
    while let Some(index) = indexer.get_next_group(group) {
        group += 1;
        if !index.is_acquired() {
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for (constituent, &record) in index.in_vecs().iter().enumerate() {
            source.read_record(record, &mut buffer)?;
            let peak = peak_magnitude(&buffer);
            stats.push(peak);
            if best.map_or(true, |(_, b)| peak > b) {
                best = Some((constituent, peak));
            }
        }
        if let Some((constituent, score)) = best {
            scores.push(VecIndexScore {
                group: index.group(),
                increments: index.increments().to_vec(),
                constituent,
                score,
            });
        }
    }

    let threshold = stats.mean() + ratio * stats.std_dev();
    let groups_scanned = scores.len();
    let mut outliers: Vec<VecIndexScore> = scores.into_iter().filter(|s| s.score > threshold).collect();
    outliers.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.constituent.cmp(&b.constituent),
        other => other,
    });
    outliers.truncate(max_results);

    log::info!(
        "Corruption scan: {} groups in {:?}, mean {:.4}, std dev {:.4}, threshold {:.4}, {} flagged",
        groups_scanned,
        start.elapsed(),
        stats.mean(),
        stats.std_dev(),
        threshold,
        outliers.len()
    );

    Ok(ScanReport {
        mean: stats.mean(),
        std_dev: stats.std_dev(),
        threshold,
        groups_scanned,
        outliers,
    })
}
