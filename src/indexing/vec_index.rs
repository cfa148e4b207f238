// In: src/indexing/vec_index.rs

/// The addressing result for one vector group.
///
/// For each constituent raw record `j` of the group it holds the physical
/// record offset (`in_vecs[j]`), the row coordinates the record contributes to
/// in the output (`out_vecs[j]`, one entry per non-leading synthetic
/// dimension) and its phase index in every acquisition dimension.
///
/// A `VecIndex` is created per request and never mutated; remapping produces
/// a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecIndex {
    pub(crate) group: usize,
    pub(crate) increments: Vec<usize>,
    pub(crate) in_vecs: Vec<usize>,
    pub(crate) out_vecs: Vec<Vec<usize>>,
    pub(crate) phases: Vec<Vec<usize>>,
    pub(crate) phase_offsets: Vec<usize>,
    pub(crate) acquired: bool,
}

impl VecIndex {
    /// The logical outer group number this index was produced for.
    pub fn group(&self) -> usize {
        self.group
    }

    /// Logical increment of each non-leading synthetic dimension.
    pub fn increments(&self) -> &[usize] {
        &self.increments
    }

    /// Number of constituent raw records.
    pub fn len(&self) -> usize {
        self.in_vecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_vecs.is_empty()
    }

    pub fn in_vec(&self, constituent: usize) -> usize {
        self.in_vecs[constituent]
    }

    pub fn in_vecs(&self) -> &[usize] {
        &self.in_vecs
    }

    pub fn out_vec(&self, constituent: usize) -> &[usize] {
        &self.out_vecs[constituent]
    }

    /// Phase index of `constituent` in acquisition dimension `dim` (0-based).
    pub fn phase(&self, constituent: usize, dim: usize) -> usize {
        self.phases[constituent][dim]
    }

    /// Phase index of `constituent` in every acquisition dimension.
    pub fn phases(&self, constituent: usize) -> &[usize] {
        &self.phases[constituent]
    }

    /// False when a NUS schedule has no record for this coordinate; the
    /// caller zero-fills such vectors instead of reading them.
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Constituent whose phase vector equals `phases`, if any.
    pub fn constituent_with_phases(&self, phases: &[usize]) -> Option<usize> {
        self.phases.iter().position(|p| p.as_slice() == phases)
    }
}
