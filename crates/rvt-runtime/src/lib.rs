//! Engine trait defining the uniform interface for program executors.
//!
//! The harness hands an engine a finished `Program`, the process arguments
//! and an optional fault point; the engine hands back an `ExecutionResult`.
//! Nothing on the harness side looks behind this boundary.

#![forbid(unsafe_code)]

pub mod host;

pub use host::{HostEngine, HostExit, HostMachine, HostRegistry, HostRoutine};

use rvt_core::{ExecutionResult, FaultPoint, Program};
use serde::{Deserialize, Serialize};

// ── Requests ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Process arguments after the program name.
    pub args: Vec<String>,
    /// Operation to fail on its first occurrence.
    pub fault: Option<FaultPoint>,
}

impl RunRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_fault(mut self, fault: FaultPoint) -> Self {
        self.fault = Some(fault);
        self
    }
}

// ── Link information ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCall {
    pub caller: String,
    pub symbol: String,
}

/// Call targets that no linked source defines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub unresolved: Vec<UnresolvedCall>,
}

impl LinkReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }

    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols = self
            .unresolved
            .iter()
            .map(|call| call.symbol.clone())
            .collect::<Vec<_>>();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

// ── Engine errors ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine cannot run at all on this machine.
    Unavailable { engine: String, detail: String },
    /// Launching or talking to the simulator failed.
    Launch { command: String, detail: String },
    /// The call target is not known to the engine.
    UnknownRoutine { name: String, available: Vec<String> },
    /// The requested fault point cannot be injected for this program.
    FaultUnsupported { fault: FaultPoint, detail: String },
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { engine, detail } => {
                write!(f, "engine {engine} unavailable: {detail}")
            }
            Self::Launch { command, detail } => {
                write!(f, "failed to launch `{command}`: {detail}")
            }
            Self::UnknownRoutine { name, available } => write!(
                f,
                "routine `{name}` is not defined (available: {})",
                available.join(", ")
            ),
            Self::FaultUnsupported { fault, detail } => {
                write!(f, "cannot inject fault at {fault}: {detail}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

// ── Engine trait ───────────────────────────────────────────────────

/// Uniform interface for program executors.
///
/// Runs are synchronous; one call blocks until the program terminates.
pub trait Engine: Send + Sync {
    /// Short engine name (e.g. "venus", "host").
    fn name(&self) -> &str;

    /// Version string recorded in test logs.
    fn version(&self) -> String;

    /// Execute a synthesized program.
    fn run(&self, program: &Program, request: &RunRequest)
    -> Result<ExecutionResult, EngineError>;

    /// Unresolved call targets, if the engine knows its symbol tables.
    /// `None` means the engine cannot tell and the caller should check
    /// sources itself.
    fn link_report(&self, _program: &Program) -> Option<LinkReport> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineError, LinkReport, RunRequest, UnresolvedCall};
    use rvt_core::FaultPoint;

    #[test]
    fn run_request_builder_keeps_order() {
        let request = RunRequest::new()
            .with_args(["m0.bin", "m1.bin", "input.bin", "out.bin"])
            .with_fault(FaultPoint::Malloc);
        assert_eq!(request.args[0], "m0.bin");
        assert_eq!(request.args[3], "out.bin");
        assert_eq!(request.fault, Some(FaultPoint::Malloc));
        assert_eq!(RunRequest::default().fault, None);
    }

    #[test]
    fn link_report_dedups_symbols() {
        let report = LinkReport {
            unresolved: vec![
                UnresolvedCall {
                    caller: "matmul".to_owned(),
                    symbol: "dot".to_owned(),
                },
                UnresolvedCall {
                    caller: "classify".to_owned(),
                    symbol: "dot".to_owned(),
                },
            ],
        };
        assert!(!report.is_clean());
        assert_eq!(report.symbols(), vec!["dot".to_owned()]);
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::UnknownRoutine {
            name: "relu".to_owned(),
            available: vec!["abs".to_owned(), "dot".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "routine `relu` is not defined (available: abs, dot)"
        );

        let err = EngineError::FaultUnsupported {
            fault: FaultPoint::Fopen,
            detail: "program links no runtime".to_owned(),
        };
        assert!(err.to_string().contains("fopen"));
    }
}
