//! Test harness for assembly routines.
//!
//! ```ignore
//! let mut t = AssemblyTest::new(&engine, config, "relu::simple", "relu.s");
//! let array = t.array(&[1, -2, 3])?;
//! t.input_array(Slot::A0, &array)?;
//! t.input_scalar(Slot::A1, 3)?;
//! t.call("relu")?;
//! t.expect_array(&array, &[1, 0, 3])?;
//! t.execute(RunRequest::new())?.assert_passed();
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod link;
pub mod marshal;
pub mod synth;
pub mod verify;

pub use assembly_test::AssemblyTest;
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use marshal::{Arena, ArrayHandle, FileBinding, FileMode};
pub use synth::ProgramSynthesizer;
pub use verify::{
    CheckFailure, CheckOutcome, CheckStatus, Expectation, VerificationReport,
};

pub use rvt_core::{ExitCode, FaultPoint, Slot};
pub use rvt_runtime::{Engine, RunRequest};
