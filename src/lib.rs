//! `psf-beads` library crate.
//!
//! Finds fluorescent beads in a 3D microscopy volume and measures the point
//! spread function by fitting Gaussians to a crop around each bead: a 1D fit
//! along Z, a 2D fit in the YX plane and a full 3D fit with covariance.
//!
//! The binary (`psf`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the finder and fitters are reusable from other tools

pub mod app;
pub mod beads;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod image;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
