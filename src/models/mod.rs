//! Gaussian PSF model functions.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic over the dimensionality.

pub mod gaussian;

pub use gaussian::*;
