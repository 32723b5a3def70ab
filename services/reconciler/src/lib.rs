//! Reconciler - turns heterogeneous epidemic case reports into clean
//! per-place cumulative time series
//!
//! Pipeline for the daily-report source:
//!   fetch -> normalize -> patch -> resolve -> aggregate -> finalize
//!
//! The single-file sources skip straight from fetch to a field mapping and,
//! where needed, finalization.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod finalize;
pub mod model;
pub mod normalize;
pub mod output;
pub mod patch;
pub mod read;
pub mod resolve;
pub mod sources;

pub use error::{Error, Result};
