// In: src/indexing/indexer.rs

//! The vector indexer.
//!
//! Raw records are addressed with a mixed-radix counter. Two orderings are in
//! play:
//! 1. The **logical** order of vector groups: the non-leading synthetic
//!    dimensions in dimension order, the first one varying fastest. The outer
//!    group index `g` counts in this order.
//! 2. The **storage** order: the axes as the acquisition order says they were
//!    written, fastest first. Physical record offsets are computed with the
//!    strides of this order.
//!
//! Phase axes that the acquisition order does not mention are stored
//! fastest, so by default the constituents of a group are contiguous records.

use crate::error::NmrProcError;
use crate::indexing::acq_order::AxisRole;
use crate::indexing::nus::NusSchedule;
use crate::indexing::vec_index::VecIndex;
use crate::types::{AcqMode, AcquisitionModel};

//==================================================================================
// 1. Internal Layout Types
//==================================================================================

/// A synthetic non-leading dimension: the delay part of an acquisition
/// dimension or the array part split off from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticDim {
    pub role: AxisRole,
    /// 1-based acquisition dimension this axis belongs to.
    pub dim: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisRef {
    Synthetic(usize),
    Phase(usize),
}

#[derive(Debug, Clone, Copy)]
struct StorageAxis {
    axis: AxisRef,
    stride: usize,
}

/// The parts of an acquisition model the layout was computed from.
#[derive(Debug, Clone, PartialEq)]
struct LayoutKey {
    sizes: Vec<usize>,
    group_sizes: Vec<usize>,
    array_sizes: Vec<usize>,
    acq_order: String,
    nus_len: Option<usize>,
}

impl LayoutKey {
    fn of(model: &AcquisitionModel) -> Self {
        Self {
            sizes: model.sizes().to_vec(),
            group_sizes: model.group_sizes().to_vec(),
            array_sizes: model.array_sizes().to_vec(),
            acq_order: model.acq_order().to_string(),
            nus_len: model.nus().map(NusSchedule::len),
        }
    }
}

//==================================================================================
// 2. The Indexer
//==================================================================================

#[derive(Debug, Clone)]
pub struct VectorIndexer {
    key: LayoutKey,
    ndim: usize,
    group_sizes: Vec<usize>,
    synthetic: Vec<SyntheticDim>,
    /// Acquisition dimensions (0-based) with more than one phase, in dimension order.
    phase_dims: Vec<usize>,
    storage: Vec<StorageAxis>,
    /// Stride of each phase dimension when a group is stored compactly.
    compact_phase_strides: Vec<usize>,
    group_size: usize,
    group_count: usize,
    nus: Option<NusSchedule>,
    modes: Vec<AcqMode>,
}

impl VectorIndexer {
    /// Computes the record layout of `model`.
    ///
    /// Fails with a configuration error when a NUS schedule and an arrayed
    /// dimension are both present: their combined record layout is undefined.
    pub fn new(model: &AcquisitionModel) -> Result<Self, NmrProcError> {
        let ndim = model.ndim();
        if model.nus().is_some() && model.is_arrayed() {
            let msg = format!(
                "NUS schedule combined with arrayed dimensions {:?} is not supported",
                model.array_sizes()
            );
            log::warn!("{}", msg);
            return Err(NmrProcError::Configuration(msg));
        }

        let mut synthetic = Vec::with_capacity(ndim);
        for dim in 2..=ndim {
            let size = model.size(dim - 1);
            let array = model.array_sizes()[dim - 1];
            if array > 0 {
                synthetic.push(SyntheticDim {
                    role: AxisRole::Delay,
                    dim,
                    size: (size / array).max(1),
                });
                synthetic.push(SyntheticDim {
                    role: AxisRole::Array,
                    dim,
                    size: array,
                });
            } else {
                synthetic.push(SyntheticDim {
                    role: AxisRole::Delay,
                    dim,
                    size,
                });
            }
        }

        let phase_dims: Vec<usize> = (0..ndim).filter(|&d| model.group_size(d) > 1).collect();
        let order = model.acq_order();

        // Storage order, fastest first.
        let mut axes: Vec<AxisRef> = phase_dims
            .iter()
            .enumerate()
            .filter(|(_, &d)| !order.contains(AxisRole::Phase, d + 1))
            .map(|(p, _)| AxisRef::Phase(p))
            .collect();
        for token in order.tokens() {
            let found = match token.role {
                AxisRole::Phase => phase_dims
                    .iter()
                    .position(|&d| d + 1 == token.dim)
                    .map(AxisRef::Phase),
                role => synthetic
                    .iter()
                    .position(|s| s.role == role && s.dim == token.dim)
                    .map(AxisRef::Synthetic),
            };
            if let Some(axis) = found {
                axes.push(axis);
            }
        }
        for (i, s) in synthetic.iter().enumerate() {
            if s.role == AxisRole::Array && !axes.contains(&AxisRef::Synthetic(i)) {
                axes.push(AxisRef::Synthetic(i));
            }
        }
        if let Some(missing) = (0..synthetic.len()).find(|i| !axes.contains(&AxisRef::Synthetic(*i))) {
            return Err(NmrProcError::Configuration(format!(
                "acquisition order '{}' does not place dimension {}",
                order, synthetic[missing].dim
            )));
        }

        let axis_size = |axis: &AxisRef| match axis {
            AxisRef::Synthetic(i) => synthetic[*i].size,
            AxisRef::Phase(p) => model.group_size(phase_dims[*p]),
        };

        let mut stride = 1;
        let mut storage = Vec::with_capacity(axes.len());
        for axis in axes {
            storage.push(StorageAxis { axis, stride });
            stride *= axis_size(&axis);
        }

        let mut compact_phase_strides = vec![0; phase_dims.len()];
        let mut compact = 1;
        for s in storage.iter() {
            if let AxisRef::Phase(p) = s.axis {
                compact_phase_strides[p] = compact;
                compact *= model.group_size(phase_dims[p]);
            }
        }

        let group_size = model.vectors_per_group();
        let group_count = synthetic.iter().map(|s| s.size).product();

        log::debug!(
            "Indexer layout: {} groups of {} records, storage {:?}",
            group_count,
            group_size,
            storage.iter().map(|s| s.axis).collect::<Vec<_>>()
        );

        Ok(Self {
            key: LayoutKey::of(model),
            ndim,
            group_sizes: model.group_sizes().to_vec(),
            synthetic,
            phase_dims,
            storage,
            compact_phase_strides,
            group_size,
            group_count,
            nus: model.nus().cloned(),
            modes: vec![AcqMode::default(); ndim],
        })
    }

    /// Installs the per-dimension combination modes derived by the caller.
    pub fn with_modes(mut self, modes: Vec<AcqMode>) -> Self {
        self.set_modes(modes);
        self
    }

    pub fn set_modes(&mut self, mut modes: Vec<AcqMode>) {
        modes.resize(self.ndim, AcqMode::default());
        self.modes = modes;
    }

    /// False once the model's sizes, array split or acquisition order no
    /// longer match the layout this indexer computed.
    pub fn is_current_for(&self, model: &AcquisitionModel) -> bool {
        self.key == LayoutKey::of(model)
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn synthetic_dims(&self) -> &[SyntheticDim] {
        &self.synthetic
    }

    /// Combination mode of acquisition dimension `dim` (0-based).
    pub fn mode(&self, dim: usize) -> AcqMode {
        self.modes.get(dim).copied().unwrap_or_default()
    }

    pub fn modes(&self) -> &[AcqMode] {
        &self.modes
    }

    /// Addressing for outer group `group`, NUS remapping applied.
    ///
    /// Returns `None` once `group` is past the last group; callers treat that
    /// as the end of the sequence.
    pub fn get_next_group(&self, group: usize) -> Option<VecIndex> {
        if group >= self.group_count {
            return None;
        }
        let mut increments = Vec::with_capacity(self.synthetic.len());
        let mut rest = group;
        for s in &self.synthetic {
            increments.push(rest % s.size);
            rest /= s.size;
        }
        self.index_for_increments(&increments)
    }

    /// Addressing for an explicit increment tuple, NUS remapping applied.
    pub fn index_for_increments(&self, increments: &[usize]) -> Option<VecIndex> {
        if increments.len() != self.synthetic.len()
            || increments.iter().zip(&self.synthetic).any(|(&i, s)| i >= s.size)
        {
            return None;
        }

        let mut group = 0;
        for (i, s) in increments.iter().zip(&self.synthetic).rev() {
            group = group * s.size + i;
        }

        let base: usize = self
            .storage
            .iter()
            .filter_map(|a| match a.axis {
                AxisRef::Synthetic(i) => Some(increments[i] * a.stride),
                AxisRef::Phase(_) => None,
            })
            .sum();

        let mut in_vecs = Vec::with_capacity(self.group_size);
        let mut out_vecs = Vec::with_capacity(self.group_size);
        let mut phases = Vec::with_capacity(self.group_size);
        let mut phase_offsets = Vec::with_capacity(self.group_size);

        for constituent in 0..self.group_size {
            // Constituent number is mixed radix over the phase dims, first fastest.
            let mut per_dim = vec![0; self.ndim];
            let mut rest = constituent;
            for &d in &self.phase_dims {
                per_dim[d] = rest % self.group_sizes[d];
                rest /= self.group_sizes[d];
            }

            let phase_part: usize = self
                .storage
                .iter()
                .filter_map(|a| match a.axis {
                    AxisRef::Phase(p) => Some(per_dim[self.phase_dims[p]] * a.stride),
                    AxisRef::Synthetic(_) => None,
                })
                .sum();
            let offset: usize = self
                .phase_dims
                .iter()
                .enumerate()
                .map(|(p, &d)| per_dim[d] * self.compact_phase_strides[p])
                .sum();

            let out: Vec<usize> = self
                .synthetic
                .iter()
                .zip(increments)
                .map(|(s, &inc)| match s.role {
                    AxisRole::Array => inc,
                    _ => inc * self.group_sizes[s.dim - 1] + per_dim[s.dim - 1],
                })
                .collect();

            in_vecs.push(base + phase_part);
            out_vecs.push(out);
            phases.push(per_dim);
            phase_offsets.push(offset);
        }

        let index = VecIndex {
            group,
            increments: increments.to_vec(),
            in_vecs,
            out_vecs,
            phases,
            phase_offsets,
            acquired: true,
        };
        Some(self.remap_nus(&index))
    }

    /// Substitutes the physically acquired record offsets for a NUS
    /// acquisition, or marks the group as not acquired.
    ///
    /// The result depends only on the index's logical increments, so applying
    /// it again yields the same index. The schedule is not modified.
    pub fn remap_nus(&self, index: &VecIndex) -> VecIndex {
        let Some(schedule) = &self.nus else {
            return index.clone();
        };
        let mut remapped = index.clone();
        match schedule.position(&index.increments) {
            Some(position) => {
                remapped.in_vecs = index
                    .phase_offsets
                    .iter()
                    .map(|offset| position * self.group_size + offset)
                    .collect();
                remapped.acquired = true;
            }
            None => remapped.acquired = false,
        }
        remapped
    }

    /// Inverse of [`get_next_group`](Self::get_next_group): maps output row
    /// coordinates (one per non-leading synthetic dimension) to the outer
    /// group that produces them.
    pub fn find_out_group(&self, rows: &[usize]) -> Option<usize> {
        if rows.len() != self.synthetic.len() {
            return None;
        }
        let mut group = 0;
        for (s, &row) in self.synthetic.iter().zip(rows).rev() {
            let increment = match s.role {
                AxisRole::Array => row,
                _ => row / self.group_sizes[s.dim - 1],
            };
            if increment >= s.size {
                return None;
            }
            group = group * s.size + increment;
        }
        Some(group)
    }
}
