//! This module maps raw acquisition records to processing-ready vector groups.
//!
//! It owns the pieces of the addressing problem: the acquisition order grammar,
//! the NUS schedule lookup, and the indexer that turns an outer group number
//! into physical record offsets and output coordinates.

//==================================================================================
// 1. Module Declarations
//==================================================================================

pub mod acq_order;
pub mod nus;

/// The "Cartographer": turns group numbers into record offsets and back.
pub mod indexer;
pub mod vec_index;


//==================================================================================
// 2. Public API Re-exports
//==================================================================================

pub use self::acq_order::{AcqOrder, AcqToken, AxisRole};
pub use self::indexer::{SyntheticDim, VectorIndexer};
pub use self::nus::NusSchedule;
pub use self::vec_index::VecIndex;
