//! Venus backend for rvtest.
//!
//! Renders each `Program` to a `.s` file and runs it with
//! `java -jar venus.jar`. The program's epilogue prints the state snapshot on
//! stdout; this crate splits it from the routine's own output. Fault points
//! are injected by linking a runtime-library variant that fails at that
//! operation instead of the regular `utils.s`.

#![forbid(unsafe_code)]

mod config;
mod engine;

pub use config::VenusConfig;
pub use engine::VenusEngine;
