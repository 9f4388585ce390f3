//! Gaussian fitting of bead crops.
//!
//! Responsibilities:
//!
//! - view a crop (or a slice of it) as a fit sample
//! - estimate initial parameters from the sample
//! - run the Z, YX and ZYX fits and collect their records

pub mod estimator;
pub mod fitter;
pub mod records;
pub mod sample;

pub use estimator::*;
pub use fitter::*;
pub use records::*;
pub use sample::*;
