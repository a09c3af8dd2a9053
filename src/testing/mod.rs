//! Support for the test suite. Since the Nimbus frontend lowers from
//! bytecode and is not part of this crate, the canonical graphs the passes
//! are tested against are built by hand in [`cases`].

pub mod cases;
