//! Numeric engines that execute pipeline scripts.
//!
//! The session talks to engines only through the `NumericEngine` trait; the
//! dispatch engine here is the in-process implementation.

pub mod dispatch;

pub use dispatch::{DispatchEngine, OpHandler};
