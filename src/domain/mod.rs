//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - bead coordinates and bead-search outcomes (`Bead`, `BeadSearch`)
//! - finder and solver options with their documented defaults
//! - the run configuration assembled from CLI flags (`AnalysisConfig`)

pub mod types;

pub use types::*;
