// In: src/indexing/nus.rs

//! Non-uniform sampling schedules.
//!
//! A schedule lists, in acquisition order, the indirect-dimension increment
//! tuples that were actually measured. The raw file holds one record group per
//! schedule entry, so the position of a tuple in the schedule is the physical
//! group that stores it.

use hashbrown::HashMap;

use crate::error::NmrProcError;

#[derive(Debug, Clone, Default)]
pub struct NusSchedule {
    entries: Vec<Vec<usize>>,
    lookup: HashMap<Vec<usize>, usize>,
}

impl PartialEq for NusSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl NusSchedule {
    /// Builds a schedule from acquired tuples. Every tuple must have the same
    /// arity (one increment per indirect dimension).
    pub fn new(entries: Vec<Vec<usize>>) -> Result<Self, NmrProcError> {
        let arity = entries.first().map_or(0, Vec::len);
        if entries.iter().any(|e| e.len() != arity) {
            return Err(NmrProcError::Configuration(
                "NUS schedule entries have differing dimension counts".to_string(),
            ));
        }
        let mut lookup = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            // A repeated tuple keeps its first acquisition.
            lookup.entry(entry.clone()).or_insert(position);
        }
        Ok(Self { entries, lookup })
    }

    /// Parses the plain-text schedule format: one acquired tuple per line,
    /// whitespace separated. Blank lines and `#` comments are ignored.
    pub fn parse(text: &str) -> Result<Self, NmrProcError> {
        let mut entries = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let tuple = line
                .split_whitespace()
                .map(|v| {
                    v.parse::<usize>().map_err(|_| {
                        NmrProcError::Configuration(format!(
                            "NUS schedule line {}: '{}' is not an increment index",
                            line_no + 1,
                            v
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            entries.push(tuple);
        }
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of indirect dimensions each entry covers.
    pub fn arity(&self) -> usize {
        self.entries.first().map_or(0, Vec::len)
    }

    pub fn entries(&self) -> &[Vec<usize>] {
        &self.entries
    }

    /// Physical group position of a logical increment tuple, if it was acquired.
    pub fn position(&self, increments: &[usize]) -> Option<usize> {
        self.lookup.get(increments).copied()
    }
}
