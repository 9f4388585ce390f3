//! Bead detection.
//!
//! `BeadFinder` locates candidate beads in a volume and sorts them into
//! accepted and discarded sets.

pub mod finder;

pub use finder::*;
