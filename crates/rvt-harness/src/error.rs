use rvt_core::{Slot, SnapshotError};
use rvt_runtime::EngineError;
use std::path::PathBuf;

/// Errors raised by `AssemblyTest` itself, as opposed to expectation
/// failures, which are collected into a `VerificationReport`.
#[derive(Debug)]
pub enum HarnessError {
    /// Scalar does not fit in a 32-bit word.
    ScalarOutOfRange { slot: Option<Slot>, value: i64 },
    /// `build` or `execute` with no call target.
    UnboundCall,
    /// Configuration or a second `execute` after the test already ran.
    AlreadyExecuted { operation: &'static str },
    /// Post-run check before `execute`.
    NotExecuted { operation: &'static str },
    InvalidFilename { name: String, reason: &'static str },
    /// Handle from a different test, or one the arena never issued.
    UnknownHandle { label: String },
    /// A call target no linked source defines.
    UnresolvedSymbol { symbol: String, caller: String },
    MissingSource { path: PathBuf },
    Engine(EngineError),
    /// The engine died instead of exiting.
    EngineCrash { detail: String, transcript: String },
    /// Exit 0 with no state snapshot, or a snapshot missing expected state.
    IncompleteSnapshot { detail: String },
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScalarOutOfRange { slot: Some(slot), value } => {
                write!(f, "value {value} for {slot} does not fit in a 32-bit word")
            }
            Self::ScalarOutOfRange { slot: None, value } => {
                write!(f, "value {value} does not fit in a 32-bit word")
            }
            Self::UnboundCall => write!(f, "no routine to call; use call() before execute()"),
            Self::AlreadyExecuted { operation } => {
                write!(f, "{operation} after the test already executed")
            }
            Self::NotExecuted { operation } => {
                write!(f, "{operation} requires execute() to run first")
            }
            Self::InvalidFilename { name, reason } => {
                write!(f, "invalid filename {name:?}: {reason}")
            }
            Self::UnknownHandle { label } => {
                write!(f, "array handle `{label}` does not belong to this test")
            }
            Self::UnresolvedSymbol { symbol, caller } => write!(
                f,
                "`{caller}` calls `{symbol}` but no included source defines it; include its file"
            ),
            Self::MissingSource { path } => {
                write!(f, "source file {} does not exist", path.display())
            }
            Self::Engine(err) => write!(f, "{err}"),
            Self::EngineCrash { detail, transcript } => {
                write!(f, "engine crashed: {detail}\n{transcript}")
            }
            Self::IncompleteSnapshot { detail } => write!(f, "incomplete state snapshot: {detail}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<EngineError> for HarnessError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<SnapshotError> for HarnessError {
    fn from(value: SnapshotError) -> Self {
        Self::IncompleteSnapshot {
            detail: value.to_string(),
        }
    }
}
