//! Family tree layout and relationship core for saga authoring.
//!
//! Re-exports modules for use by binaries and tools.

pub mod genealogy;
