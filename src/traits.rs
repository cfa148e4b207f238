//! This module defines shared traits used across the raw record readers.

use num_traits::ToPrimitive;

/// A primitive sample type that can appear in a raw FID record.
///
/// Implementors are plain-old-data so a record buffer can be viewed as a typed
/// slice without copying, and convert losslessly enough to `f64` for processing.
pub trait RawSample: bytemuck::Pod + ToPrimitive {
    /// Reverses the byte order when the stored endianness differs from the host.
    fn from_le(self) -> Self;

    fn to_sample(self) -> f64 {
        self.from_le().to_f64().unwrap_or(0.0)
    }
}

// Implement the trait for the sample types instruments actually write.
macro_rules! impl_raw_int_sample {
    ($T:ty) => {
        impl RawSample for $T {
            fn from_le(self) -> Self {
                <$T>::from_le(self)
            }
        }
    };
}

macro_rules! impl_raw_float_sample {
    ($T:ty, $Bits:ty) => {
        impl RawSample for $T {
            fn from_le(self) -> Self {
                <$T>::from_bits(<$Bits>::from_le(self.to_bits()))
            }
        }
    };
}

impl_raw_int_sample!(i16);
impl_raw_int_sample!(i32);
impl_raw_float_sample!(f32, u32);
impl_raw_float_sample!(f64, u64);
