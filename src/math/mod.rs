//! Mathematical utilities: filters, peak detection, statistics and
//! nonlinear least squares.

pub mod filters;
pub mod lm;
pub mod ols;
pub mod peaks;
pub mod stats;

pub use filters::*;
pub use lm::*;
pub use ols::*;
pub use peaks::*;
pub use stats::*;
