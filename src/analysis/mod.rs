//! Client-side computations over API snapshots.
//!
//! This module provides the allocation aggregator, the derived dashboard
//! statistics and form validation.

pub mod aggregator;
pub mod validation;

pub use aggregator::*;
