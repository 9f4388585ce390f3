//! Calibrated intensity images.
//!
//! - N-d intensity arrays with physical voxel spacing (`calibrated`)
//! - crops around a bead and their coordinate bookkeeping (`crop`)

pub mod calibrated;
pub mod crop;

pub use calibrated::*;
pub use crop::*;
