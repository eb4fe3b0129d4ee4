use crate::snapshot::StateSnapshot;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The program exited through the simulator with this code, either from
    /// the epilogue (0) or from a routine's error path.
    Exited(i32),
    /// The simulator itself failed: killed by a signal, runtime trap, or a
    /// garbled snapshot.
    Crashed(String),
}

/// What an engine reports back. Read-only input to verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub termination: Termination,
    /// Routine stdout with the epilogue snapshot removed.
    pub stdout: String,
    pub stderr: String,
    /// Present only when the epilogue ran, i.e. the routine returned.
    pub snapshot: Option<StateSnapshot>,
    /// Rendered engine invocation, kept for replay.
    pub command: Option<String>,
    /// Program file the engine ran, when it wrote one.
    pub program_path: Option<PathBuf>,
}

impl ExecutionResult {
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            Termination::Crashed(_) => None,
        }
    }

    #[must_use]
    pub fn crashed(&self) -> bool {
        matches!(self.termination, Termination::Crashed(_))
    }

    /// Raw engine output for crash diagnostics.
    #[must_use]
    pub fn transcript(&self) -> String {
        format!(
            "termination: {:?}\ncommand: {}\nstdout:\n{}\nstderr:\n{}",
            self.termination,
            self.command.as_deref().unwrap_or("<in-process>"),
            self.stdout,
            self.stderr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionResult, Termination};

    #[test]
    fn exit_code_only_for_clean_exits() {
        let mut result = ExecutionResult {
            termination: Termination::Exited(64),
            stdout: String::new(),
            stderr: String::new(),
            snapshot: None,
            command: None,
            program_path: None,
        };
        assert_eq!(result.exit_code(), Some(64));
        assert!(!result.crashed());

        result.termination = Termination::Crashed("signal 9".to_owned());
        assert_eq!(result.exit_code(), None);
        assert!(result.transcript().contains("signal 9"));
        assert!(result.transcript().contains("<in-process>"));
    }
}
