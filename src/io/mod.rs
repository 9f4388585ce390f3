//! Input/output helpers.
//!
//! - bead list CSV ingest (`ingest`)
//! - result, bead and statistics exports to CSV (`export`)
//! - results JSON read/write (`records`)

pub mod export;
pub mod ingest;
pub mod records;

pub use export::*;
pub use ingest::*;
pub use records::*;
