// In: src/pipeline/registry.rs

//! The per-dimension operation registry.
//!
//! Each dimension key owns an ordered operation list. A separate header list
//! holds file-scope directives that precede every dimension block. Iteration
//! follows [`compare_dim_keys`].

use std::cmp::Ordering;

use hashbrown::HashMap;

use crate::error::NmrProcError;
use crate::pipeline::models::{DimKey, Operation};
use crate::types::AcqMode;

/// Orders dimension keys for script emission.
///
/// Keys compare by the part before their first comma, then a comma key comes
/// before the bare key it extends, then by the rest. So `"D2,3"` precedes
/// `"D2"` and `"D1"` precedes `"D12,3"`. `None` sorts after every key.
pub fn compare_dim_keys(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => split_key(a).cmp(&split_key(b)),
    }
}

// (head, no tail, tail): a bare key sorts after the comma keys sharing its head.
fn split_key(key: &str) -> (&str, bool, &str) {
    match key.split_once(',') {
        Some((head, tail)) => (head, false, tail),
        None => (key, true, ""),
    }
}

/// Outcome of replacing one dimension's operation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpListUpdate {
    Updated,
    /// The primary dimension's list was emptied; callers stop auto-reprocessing.
    Invalidated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRegistry {
    entries: HashMap<DimKey, Vec<Operation>>,
    header: Vec<Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: DimKey, ops: Vec<Operation>) {
        self.entries.insert(key, ops);
    }

    /// Parses `key` and each operation text, then stores them.
    pub fn put_text(&mut self, key: &str, ops: &[&str]) -> Result<(), NmrProcError> {
        let key = DimKey::parse(key)?;
        let ops = ops
            .iter()
            .map(|op| Operation::parse(op))
            .collect::<Result<Vec<_>, _>>()?;
        self.put(key, ops);
        Ok(())
    }

    pub fn get(&self, key: &DimKey) -> Option<&[Operation]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, key: &DimKey) -> Option<&mut Vec<Operation>> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &DimKey) -> Option<Vec<Operation>> {
        self.entries.remove(key)
    }

    /// Removes every dimension list and the header.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.header.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.header.is_empty()
    }

    /// Replaces `key`'s list, reporting when the primary list was emptied.
    pub fn update_op_list(&mut self, key: DimKey, ops: Vec<Operation>) -> OpListUpdate {
        let invalidated = key.is_primary() && ops.is_empty();
        self.put(key, ops);
        if invalidated {
            log::debug!("Operation list for D1 cleared; processing list is invalid");
            OpListUpdate::Invalidated
        } else {
            OpListUpdate::Updated
        }
    }

    /// Keys in emission order.
    pub fn keys(&self) -> Vec<&DimKey> {
        let mut keys: Vec<&DimKey> = self.entries.keys().collect();
        keys.sort();
        keys
    }

    /// `(key, ops)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&DimKey, &[Operation])> + '_ {
        self.keys()
            .into_iter()
            .map(move |k| (k, self.entries[k].as_slice()))
    }

    pub fn header(&self) -> &[Operation] {
        &self.header
    }

    pub fn set_header(&mut self, header: Vec<Operation>) {
        self.header = header;
    }

    pub fn push_header(&mut self, op: Operation) {
        self.header.push(op);
    }

    /// True when the single-dimension list for `dim` (1-based) holds an
    /// enabled `SKIP` operation.
    pub fn is_dim_skipped(&self, dim: usize) -> bool {
        self.get(&DimKey::dim(dim))
            .map_or(false, |ops| ops.iter().any(|op| op.is("SKIP") && !op.is_disabled()))
    }

    /// Per-dimension combination modes derived from enabled `TDCOMB` operations.
    ///
    /// `TDCOMB(dim=k,coef=...)` sets the mode of 1-based dimension `k`; any
    /// dimension without one stays hypercomplex.
    pub fn acq_modes(&self, ndim: usize) -> Result<Vec<AcqMode>, NmrProcError> {
        let mut modes = vec![AcqMode::default(); ndim];
        for (_, ops) in self.iter() {
            for op in ops.iter().filter(|op| op.is("TDCOMB") && !op.is_disabled()) {
                let (Some(dim), Some(coef)) = (op.param("dim"), op.param("coef")) else {
                    continue;
                };
                let dim: usize = dim.trim().parse().map_err(|_| {
                    NmrProcError::Configuration(format!("{}: dim '{}' is not a dimension number", op, dim))
                })?;
                if dim == 0 || dim > ndim {
                    return Err(NmrProcError::Configuration(format!(
                        "{}: dimension {} is outside a {}D acquisition",
                        op, dim, ndim
                    )));
                }
                modes[dim - 1] = parse_coef(coef).ok_or_else(|| {
                    NmrProcError::Configuration(format!("{}: unknown coefficient '{}'", op, coef))
                })?;
            }
        }
        Ok(modes)
    }
}

fn parse_coef(coef: &str) -> Option<AcqMode> {
    let coef = coef.trim().trim_matches(|c| c == '\'' || c == '"');
    match coef.to_ascii_lowercase().as_str() {
        "hyper" | "hypercomplex" => Some(AcqMode::Hypercomplex),
        "echo-antiecho" | "ea" => Some(AcqMode::EchoAntiecho {
            coef_a: 1.0,
            coef_b: 1.0,
        }),
        "echo-antiecho-r" | "ea-r" => Some(AcqMode::EchoAntiecho {
            coef_a: 1.0,
            coef_b: -1.0,
        }),
        list => {
            let inner = list.strip_prefix('[')?.strip_suffix(']')?;
            let values: Vec<f64> = inner
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .ok()?;
            match values.as_slice() {
                [a, b] => Some(AcqMode::EchoAntiecho {
                    coef_a: *a,
                    coef_b: *b,
                }),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_key_sorts_before_its_prefix() {
        assert_eq!(compare_dim_keys(Some("D2,3"), Some("D2")), Ordering::Less);
        assert_eq!(compare_dim_keys(Some("D2"), Some("D2,3")), Ordering::Greater);
    }

    #[test]
    fn test_plain_keys_compare_lexically() {
        assert_eq!(compare_dim_keys(Some("D10"), Some("D2")), Ordering::Less);
        assert_eq!(compare_dim_keys(Some("D1"), Some("D2")), Ordering::Less);
        assert_eq!(compare_dim_keys(Some("D2"), Some("D2")), Ordering::Equal);
        // Comma key that does not extend the other falls back to string order.
        assert_eq!(compare_dim_keys(Some("D3,4"), Some("D2")), Ordering::Greater);
        assert_eq!(compare_dim_keys(Some("D2,3"), Some("D3,4")), Ordering::Less);
        // A shorter key that is only a string prefix of the head stays first.
        assert_eq!(compare_dim_keys(Some("D1"), Some("D12,3")), Ordering::Less);
        assert_eq!(compare_dim_keys(Some("D1"), Some("D10")), Ordering::Less);
        assert_eq!(compare_dim_keys(Some("D10"), Some("D12,3")), Ordering::Less);

        let orders = [
            ["D1", "D10", "D12,3"],
            ["D12,3", "D10", "D1"],
            ["D10", "D12,3", "D1"],
            ["D12,3", "D1", "D10"],
        ];
        for order in orders {
            let mut keys: Vec<Option<&str>> = order.iter().map(|k| Some(*k)).collect();
            keys.sort_by(|a, b| compare_dim_keys(*a, *b));
            assert_eq!(keys, vec![Some("D1"), Some("D10"), Some("D12,3")]);
        }
    }

    #[test]
    fn test_none_sorts_last() {
        assert_eq!(compare_dim_keys(None, Some("D1")), Ordering::Greater);
        assert_eq!(compare_dim_keys(Some("D_ALL"), None), Ordering::Less);
        assert_eq!(compare_dim_keys(None, None), Ordering::Equal);

        let mut keys = vec![None, Some("D2"), Some("D2,3"), Some("D1")];
        keys.sort_by(|a, b| compare_dim_keys(*a, *b));
        assert_eq!(keys, vec![Some("D1"), Some("D2,3"), Some("D2"), None]);
    }

    #[test]
    fn test_iteration_follows_comparator() {
        let mut registry = OperationRegistry::new();
        registry.put_text("D2", &["FT"]).unwrap();
        registry.put_text("D1", &["ZF", "FT"]).unwrap();
        registry.put_text("D2,3", &["NESTA"]).unwrap();
        registry.put_text("D_ALL", &["EXTRACT(start=0)"]).unwrap();
        let keys: Vec<&str> = registry.keys().iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["D1", "D2,3", "D2", "D_ALL"]);
    }

    #[test]
    fn test_clearing_primary_list_invalidates() {
        let mut registry = OperationRegistry::new();
        let ft = vec![Operation::new("FT")];
        assert_eq!(registry.update_op_list(DimKey::dim(1), ft.clone()), OpListUpdate::Updated);
        assert_eq!(registry.update_op_list(DimKey::dim(2), Vec::new()), OpListUpdate::Updated);
        assert_eq!(registry.update_op_list(DimKey::dim(1), Vec::new()), OpListUpdate::Invalidated);
        assert_eq!(registry.get(&DimKey::dim(1)), Some(&[][..]));
    }

    #[test]
    fn test_clear_removes_header_too() {
        let mut registry = OperationRegistry::new();
        registry.push_header(Operation::new("ref").with_positional("4.7"));
        registry.put_text("D1", &["FT"]).unwrap();
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_acq_modes_from_tdcomb() {
        let mut registry = OperationRegistry::new();
        registry
            .put_text(
                "D1",
                &[
                    "TDCOMB(dim=2,coef=echo-antiecho-r)",
                    "TDCOMB(dim=3,coef=[0.5,-2])",
                    "TDCOMB(dim=4,coef=ea,disabled=True)",
                ],
            )
            .unwrap();
        let modes = registry.acq_modes(4).unwrap();
        assert_eq!(modes[0], AcqMode::Hypercomplex);
        assert_eq!(modes[1], AcqMode::EchoAntiecho { coef_a: 1.0, coef_b: -1.0 });
        assert_eq!(modes[2], AcqMode::EchoAntiecho { coef_a: 0.5, coef_b: -2.0 });
        assert_eq!(modes[3], AcqMode::Hypercomplex);

        registry.put_text("D2", &["TDCOMB(dim=2,coef=bogus)"]).unwrap();
        assert!(registry.acq_modes(4).is_err());
    }

    #[test]
    fn test_skip_detection_ignores_disabled() {
        let mut registry = OperationRegistry::new();
        registry.put_text("D2", &["SKIP()"]).unwrap();
        registry.put_text("D3", &["SKIP(disabled=True)"]).unwrap();
        assert!(registry.is_dim_skipped(2));
        assert!(!registry.is_dim_skipped(3));
        assert!(!registry.is_dim_skipped(1));
    }
}
