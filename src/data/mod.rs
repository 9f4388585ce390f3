//! Volume sources.
//!
//! Reading microscope files is out of scope; volumes are rendered from a
//! seeded synthetic bead field instead.

pub mod synthetic;

pub use synthetic::*;
