//! The read-only description of a raw multidimensional acquisition.

use serde::{Deserialize, Serialize};

use crate::error::NmrProcError;
use crate::indexing::acq_order::AcqOrder;
use crate::indexing::nus::NusSchedule;

/// Reference and calibration parameters of one acquisition dimension.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DimParams {
    /// Spectral width in Hz.
    pub sw: f64,
    /// Spectrometer frequency in MHz.
    pub sf: f64,
    /// Reference position in ppm, `None` lets the engine pick its default.
    #[serde(default)]
    pub reference: Option<f64>,
    #[serde(default)]
    pub label: String,
}

/// How the phase-cycled records of one indirect dimension are combined.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AcqMode {
    /// Real/imaginary records are used as an interleaved pair unchanged.
    #[default]
    Hypercomplex,
    /// Echo and anti-echo records are combined with a coefficient pair.
    EchoAntiecho { coef_a: f64, coef_b: f64 },
}

/// A view over one opened raw FID: its shape, layout and calibration.
///
/// Zero sizes and group sizes are normalized to 1 at construction, so every
/// consumer can treat them as strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionModel {
    dataset_id: String,
    sizes: Vec<usize>,
    complex: Vec<bool>,
    group_sizes: Vec<usize>,
    array_sizes: Vec<usize>,
    acq_order: AcqOrder,
    nus: Option<NusSchedule>,
    dim_params: Vec<DimParams>,
    fixdsp: bool,
}

impl AcquisitionModel {
    /// Creates a model with the default acquisition order for `sizes.len()` dimensions.
    pub fn new(
        dataset_id: impl Into<String>,
        sizes: Vec<usize>,
        complex: Vec<bool>,
        group_sizes: Vec<usize>,
    ) -> Result<Self, NmrProcError> {
        let ndim = sizes.len();
        if ndim == 0 {
            return Err(NmrProcError::Configuration(
                "an acquisition needs at least one dimension".to_string(),
            ));
        }
        if complex.len() != ndim || group_sizes.len() != ndim {
            return Err(NmrProcError::Configuration(format!(
                "dimension count mismatch: {} sizes, {} complex flags, {} group sizes",
                ndim,
                complex.len(),
                group_sizes.len()
            )));
        }
        Ok(Self {
            dataset_id: dataset_id.into(),
            sizes: sizes.into_iter().map(|s| s.max(1)).collect(),
            complex,
            group_sizes: group_sizes.into_iter().map(|g| g.max(1)).collect(),
            array_sizes: vec![0; ndim],
            acq_order: AcqOrder::default_for(ndim),
            nus: None,
            dim_params: vec![DimParams::default(); ndim],
            fixdsp: false,
        })
    }

    pub fn with_acq_order(mut self, text: &str) -> Result<Self, NmrProcError> {
        self.acq_order = AcqOrder::parse(text, self.ndim())?;
        Ok(self)
    }

    /// Splits dimensions into arrayed sub-dimensions; `0` means not arrayed.
    pub fn with_array_sizes(mut self, array_sizes: Vec<usize>) -> Result<Self, NmrProcError> {
        if array_sizes.len() != self.ndim() {
            return Err(NmrProcError::Configuration(format!(
                "expected {} array sizes, got {}",
                self.ndim(),
                array_sizes.len()
            )));
        }
        if array_sizes[0] > 0 {
            return Err(NmrProcError::Configuration(
                "the direct dimension cannot be arrayed".to_string(),
            ));
        }
        self.array_sizes = array_sizes;
        Ok(self)
    }

    pub fn with_nus(mut self, schedule: NusSchedule) -> Result<Self, NmrProcError> {
        if schedule.arity() != self.ndim() - 1 {
            return Err(NmrProcError::Configuration(format!(
                "NUS schedule covers {} dimensions, acquisition has {} indirect dimensions",
                schedule.arity(),
                self.ndim() - 1
            )));
        }
        self.nus = Some(schedule);
        Ok(self)
    }

    pub fn with_dim_params(mut self, params: Vec<DimParams>) -> Result<Self, NmrProcError> {
        if params.len() != self.ndim() {
            return Err(NmrProcError::Configuration(format!(
                "expected {} dimension parameter sets, got {}",
                self.ndim(),
                params.len()
            )));
        }
        self.dim_params = params;
        Ok(self)
    }

    pub fn with_fixdsp(mut self, fixdsp: bool) -> Self {
        self.fixdsp = fixdsp;
        self
    }

    /// Replaces the acquisition order. On failure the prior order is kept and
    /// a warning is logged before the error is returned.
    pub fn set_acq_order(&mut self, text: &str) -> Result<(), NmrProcError> {
        match AcqOrder::parse(text, self.ndim()) {
            Ok(order) => {
                self.acq_order = order;
                Ok(())
            }
            Err(err) => {
                log::warn!(
                    "Ignoring acquisition order '{}', keeping '{}': {}",
                    text,
                    self.acq_order,
                    err
                );
                Err(err)
            }
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn ndim(&self) -> usize {
        self.sizes.len()
    }

    pub fn size(&self, dim: usize) -> usize {
        self.sizes[dim]
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn is_complex(&self, dim: usize) -> bool {
        self.complex[dim]
    }

    pub fn complex_flags(&self) -> &[bool] {
        &self.complex
    }

    pub fn group_size(&self, dim: usize) -> usize {
        self.group_sizes[dim]
    }

    pub fn group_sizes(&self) -> &[usize] {
        &self.group_sizes
    }

    pub fn array_sizes(&self) -> &[usize] {
        &self.array_sizes
    }

    pub fn is_arrayed(&self) -> bool {
        self.array_sizes.iter().any(|&a| a > 0)
    }

    pub fn acq_order(&self) -> &AcqOrder {
        &self.acq_order
    }

    pub fn nus(&self) -> Option<&NusSchedule> {
        self.nus.as_ref()
    }

    pub fn dim_params(&self) -> &[DimParams] {
        &self.dim_params
    }

    pub fn fixdsp(&self) -> bool {
        self.fixdsp
    }

    /// Number of raw records that make up one vector group.
    pub fn vectors_per_group(&self) -> usize {
        self.group_sizes.iter().product()
    }

    /// Number of complex (or real) points in one raw record.
    pub fn points_per_record(&self) -> usize {
        self.sizes[0]
    }

    /// Total records the raw file is expected to hold.
    pub fn record_count(&self) -> usize {
        let groups = match &self.nus {
            Some(schedule) => schedule.len(),
            None => self.sizes[1..].iter().product(),
        };
        groups * self.vectors_per_group()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_2d() -> AcquisitionModel {
        AcquisitionModel::new("fid", vec![1024, 16], vec![true, true], vec![2, 1]).unwrap()
    }

    #[test]
    fn test_zero_sizes_are_normalized() {
        let model = AcquisitionModel::new("fid", vec![0, 8], vec![true, false], vec![0, 0]).unwrap();
        assert_eq!(model.sizes(), &[1, 8]);
        assert_eq!(model.group_sizes(), &[1, 1]);
        assert_eq!(model.vectors_per_group(), 1);
    }

    #[test]
    fn test_mismatched_lengths_are_rejected() {
        let result = AcquisitionModel::new("fid", vec![8, 8], vec![true], vec![1, 1]);
        assert!(matches!(result, Err(NmrProcError::Configuration(_))));
    }

    #[test]
    fn test_set_acq_order_keeps_prior_on_failure() {
        let mut model = model_2d().with_acq_order("p1,d2").unwrap();
        assert!(model.set_acq_order("d2,d3").is_err());
        assert_eq!(model.acq_order().to_string(), "p1,d2");
        model.set_acq_order("d2").unwrap();
        assert_eq!(model.acq_order().to_string(), "d2");
    }

    #[test]
    fn test_record_count_with_and_without_nus() {
        let model = model_2d();
        assert_eq!(model.record_count(), 32);

        let schedule = NusSchedule::new(vec![vec![0], vec![3], vec![7]]).unwrap();
        let model = model.with_nus(schedule).unwrap();
        assert_eq!(model.record_count(), 6);
    }

    #[test]
    fn test_nus_arity_must_match() {
        let schedule = NusSchedule::new(vec![vec![0, 0]]).unwrap();
        assert!(model_2d().with_nus(schedule).is_err());
    }
}
