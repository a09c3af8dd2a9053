//! # Nimbus MIR
//!
//! Mid-level SSA intermediate representation and scalar optimization passes
//! for the Nimbus JavaScript JIT: constant propagation with phi-cycle
//! resolution, and bounds-check elimination driven by induction-variable
//! range analysis.
//!
//! The pipeline is expected to number basic blocks in reverse postorder and
//! to run value numbering before these passes; see [`opt`] for the drivers.

pub mod base;
pub mod mir;
pub mod opt;
pub mod testing;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
