//! Expectations and the report they produce.
//!
//! Checks never stop at the first failure: every registered expectation is
//! evaluated and its outcome recorded, so one run shows everything that is
//! wrong with a routine.

use crate::marshal::ArrayHandle;
use rvt_core::{DumpPlan, RegionDump, Slot, StateSnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MAX_LISTED_MISMATCHES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    Scalar {
        slot: Slot,
        expected: i32,
    },
    Array {
        handle: ArrayHandle,
        expected: Vec<i32>,
    },
    /// The slot holds an address after the call; compare memory there.
    ArrayViaPointer {
        slot: Slot,
        expected: Vec<i32>,
    },
    File {
        actual: PathBuf,
        reference: PathBuf,
    },
    Stdout {
        expected: String,
    },
}

impl Expectation {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar { slot, expected } => format!("{slot} == {expected}"),
            Self::Array { handle, expected } => {
                format!("{} holds {} words", handle.label(), expected.len())
            }
            Self::ArrayViaPointer { slot, expected } => {
                format!("*{slot} holds {} words", expected.len())
            }
            Self::File { actual, reference } => {
                format!("{} matches {}", actual.display(), reference.display())
            }
            Self::Stdout { .. } => "stdout".to_owned(),
        }
    }

    /// Needs register or memory state from the epilogue.
    #[must_use]
    pub fn needs_state(&self) -> bool {
        matches!(
            self,
            Self::Scalar { .. } | Self::Array { .. } | Self::ArrayViaPointer { .. }
        )
    }
}

/// Registers and memory regions the epilogue must report for `expectations`.
#[must_use]
pub fn dump_plan<'a>(expectations: impl IntoIterator<Item = &'a Expectation>) -> DumpPlan {
    let mut plan = DumpPlan::default();
    for expectation in expectations {
        match expectation {
            Expectation::Scalar { slot, .. } => {
                plan.registers.insert(*slot);
            }
            Expectation::Array { handle, .. } => {
                let region = RegionDump::Symbol {
                    label: handle.label().to_owned(),
                    len: handle.len() as u32,
                };
                if !plan.regions.contains(&region) {
                    plan.regions.push(region);
                }
            }
            Expectation::ArrayViaPointer { slot, expected } => {
                plan.registers.insert(*slot);
                let region = RegionDump::Pointer {
                    slot: *slot,
                    len: expected.len() as u32,
                };
                if !plan.regions.contains(&region) {
                    plan.regions.push(region);
                }
            }
            Expectation::File { .. } | Expectation::Stdout { .. } => {}
        }
    }
    plan
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CheckFailure {
    Mismatch(String),
    /// The routine never created the output file.
    MissingOutput(PathBuf),
    /// The reference file is absent; the test itself is broken.
    MissingReference(PathBuf),
    /// The snapshot lacks state the check needs.
    MissingState(String),
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch(detail) => f.write_str(detail),
            Self::MissingOutput(path) => {
                write!(f, "the program never created the output file {}", path.display())
            }
            Self::MissingReference(path) => {
                write!(f, "reference file {} does not exist", path.display())
            }
            Self::MissingState(detail) => write!(f, "missing state: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed(CheckFailure),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub description: String,
    pub status: CheckStatus,
}

impl CheckOutcome {
    fn new(description: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            description: description.into(),
            status,
        }
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        matches!(self.status, CheckStatus::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub test_id: String,
    pub expected_exit: i32,
    /// `None` when the engine crashed.
    pub actual_exit: Option<i32>,
    pub outcomes: Vec<CheckOutcome>,
}

impl VerificationReport {
    #[must_use]
    pub fn new(test_id: impl Into<String>, expected_exit: i32, actual_exit: Option<i32>) -> Self {
        let mut report = Self {
            test_id: test_id.into(),
            expected_exit,
            actual_exit,
            outcomes: Vec::new(),
        };
        let status = match actual_exit {
            Some(code) if code == expected_exit => CheckStatus::Passed,
            Some(code) => CheckStatus::Failed(CheckFailure::Mismatch(format!(
                "expected exit code {expected_exit}, got {code}"
            ))),
            None => CheckStatus::Failed(CheckFailure::Mismatch(format!(
                "expected exit code {expected_exit}, engine crashed"
            ))),
        };
        report.push(CheckOutcome::new("exit code", status));
        report
    }

    pub fn push(&mut self, outcome: CheckOutcome) {
        self.outcomes.push(outcome);
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        !self.outcomes.iter().any(CheckOutcome::failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.failed())
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, CheckStatus::Skipped(_)))
            .count()
    }

    /// Panics listing every failed check.
    pub fn assert_passed(&self) {
        if !self.passed() {
            panic!("{self}");
        }
    }
}

impl std::fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let failed = self.failures().count();
        if failed == 0 {
            return write!(
                f,
                "{}: {} checks passed ({} skipped)",
                self.test_id,
                self.outcomes.len() - self.skipped(),
                self.skipped()
            );
        }
        writeln!(f, "{}: {failed} of {} checks failed", self.test_id, self.outcomes.len())?;
        for outcome in self.failures() {
            if let CheckStatus::Failed(failure) = &outcome.status {
                writeln!(f, "  - {}: {failure}", outcome.description)?;
            }
        }
        Ok(())
    }
}

/// Outcome recorded for a check that could not run.
#[must_use]
pub fn skipped(expectation: &Expectation, reason: impl Into<String>) -> CheckOutcome {
    CheckOutcome::new(expectation.describe(), CheckStatus::Skipped(reason.into()))
}

/// Checks a register or memory expectation against the snapshot.
#[must_use]
pub fn check_state(expectation: &Expectation, snapshot: &StateSnapshot) -> CheckOutcome {
    let status = match expectation {
        Expectation::Scalar { slot, expected } => match snapshot.register(*slot) {
            Some(actual) if actual == *expected => CheckStatus::Passed,
            Some(actual) => CheckStatus::Failed(CheckFailure::Mismatch(format!(
                "{slot}: expected {expected}, got {actual}"
            ))),
            None => CheckStatus::Failed(CheckFailure::MissingState(format!("register {slot}"))),
        },
        Expectation::Array { handle, expected } => {
            if handle.len() != expected.len() {
                CheckStatus::Failed(CheckFailure::Mismatch(format!(
                    "{} has {} elements, expected array has {}",
                    handle.label(),
                    handle.len(),
                    expected.len()
                )))
            } else {
                match snapshot.symbol(handle.label()) {
                    Some(address) => compare_words(snapshot, address, expected, handle.label()),
                    None => CheckStatus::Failed(CheckFailure::MissingState(format!(
                        "address of {}",
                        handle.label()
                    ))),
                }
            }
        }
        Expectation::ArrayViaPointer { slot, expected } => match snapshot.register(*slot) {
            Some(address) => compare_words(snapshot, address as u32, expected, slot.as_str()),
            None => CheckStatus::Failed(CheckFailure::MissingState(format!("register {slot}"))),
        },
        Expectation::File { .. } | Expectation::Stdout { .. } => {
            CheckStatus::Skipped("not a state expectation".to_owned())
        }
    };
    CheckOutcome::new(expectation.describe(), status)
}

fn compare_words(
    snapshot: &StateSnapshot,
    address: u32,
    expected: &[i32],
    name: &str,
) -> CheckStatus {
    match snapshot.read_words(address, expected.len()) {
        Ok(actual) => match describe_mismatch(expected, &actual) {
            None => CheckStatus::Passed,
            Some(detail) => {
                CheckStatus::Failed(CheckFailure::Mismatch(format!("{name}: {detail}")))
            }
        },
        Err(gap) => CheckStatus::Failed(CheckFailure::MissingState(format!(
            "{name}: memory at {gap:#010x} was not captured"
        ))),
    }
}

/// `None` when equal, otherwise the differing elements (first few listed).
#[must_use]
pub fn describe_mismatch(expected: &[i32], actual: &[i32]) -> Option<String> {
    if expected.len() != actual.len() {
        return Some(format!(
            "expected {} elements, got {}",
            expected.len(),
            actual.len()
        ));
    }
    let diffs = expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (want, got))| want != got)
        .collect::<Vec<_>>();
    if diffs.is_empty() {
        return None;
    }
    let listed = diffs
        .iter()
        .take(MAX_LISTED_MISMATCHES)
        .map(|(index, (want, got))| format!("[{index}] expected {want}, got {got}"))
        .collect::<Vec<_>>()
        .join("; ");
    let more = diffs.len().saturating_sub(MAX_LISTED_MISMATCHES);
    Some(if more > 0 {
        format!("{} elements differ: {listed}; and {more} more", diffs.len())
    } else {
        format!("{} elements differ: {listed}", diffs.len())
    })
}

/// Byte-exact file comparison.
#[must_use]
pub fn check_file(actual: &Path, reference: &Path) -> CheckOutcome {
    let description = format!("{} matches {}", actual.display(), reference.display());
    let reference_bytes = match std::fs::read(reference) {
        Ok(bytes) => bytes,
        Err(_) => {
            return CheckOutcome::new(
                description,
                CheckStatus::Failed(CheckFailure::MissingReference(reference.to_path_buf())),
            );
        }
    };
    let actual_bytes = match std::fs::read(actual) {
        Ok(bytes) => bytes,
        Err(_) => {
            return CheckOutcome::new(
                description,
                CheckStatus::Failed(CheckFailure::MissingOutput(actual.to_path_buf())),
            );
        }
    };
    let status = if actual_bytes == reference_bytes {
        CheckStatus::Passed
    } else {
        let first_diff = actual_bytes
            .iter()
            .zip(&reference_bytes)
            .position(|(a, b)| a != b)
            .unwrap_or(actual_bytes.len().min(reference_bytes.len()));
        CheckStatus::Failed(CheckFailure::Mismatch(format!(
            "bytes differ at offset {first_diff} ({} vs {} bytes)",
            actual_bytes.len(),
            reference_bytes.len()
        )))
    };
    CheckOutcome::new(description, status)
}

#[must_use]
pub fn check_stdout(expected: &str, actual: &str) -> CheckOutcome {
    let status = if expected == actual {
        CheckStatus::Passed
    } else {
        CheckStatus::Failed(CheckFailure::Mismatch(format!(
            "stdout: expected {expected:?}, got {actual:?}"
        )))
    };
    CheckOutcome::new("stdout", status)
}

#[cfg(test)]
mod tests {
    use super::{
        CheckFailure, CheckStatus, Expectation, VerificationReport, check_file, check_state,
        check_stdout, describe_mismatch, dump_plan,
    };
    use crate::marshal::Arena;
    use rvt_core::{RegionDump, Slot, StateSnapshot};

    fn snapshot_with_array(label: &str, address: u32, values: &[i32]) -> StateSnapshot {
        let mut snapshot = StateSnapshot::default();
        snapshot.symbols.insert(label.to_owned(), address);
        for (index, value) in values.iter().enumerate() {
            snapshot.memory.insert(address + index as u32 * 4, *value);
        }
        snapshot
    }

    #[test]
    fn dump_plan_collects_registers_and_regions_once() {
        let mut arena = Arena::new();
        let handle = arena.register_array(&[0; 4]);
        let expectations = vec![
            Expectation::Scalar { slot: Slot::A0, expected: 1 },
            Expectation::Array { handle: handle.clone(), expected: vec![1; 4] },
            Expectation::Array { handle, expected: vec![2; 4] },
            Expectation::ArrayViaPointer { slot: Slot::A0, expected: vec![0; 6] },
        ];
        let plan = dump_plan(&expectations);
        assert_eq!(plan.registers.len(), 1);
        assert_eq!(
            plan.regions,
            vec![
                RegionDump::Symbol { label: "rvt_array_0".to_owned(), len: 4 },
                RegionDump::Pointer { slot: Slot::A0, len: 6 },
            ]
        );
    }

    #[test]
    fn array_check_lists_differences() {
        let mut arena = Arena::new();
        let handle = arena.register_array(&[0; 3]);
        let snapshot = snapshot_with_array(handle.label(), 0x1000_0000, &[1, 0, 3]);
        let pass = Expectation::Array { handle: handle.clone(), expected: vec![1, 0, 3] };
        assert_eq!(check_state(&pass, &snapshot).status, CheckStatus::Passed);

        let fail = Expectation::Array { handle, expected: vec![1, 2, 3] };
        match check_state(&fail, &snapshot).status {
            CheckStatus::Failed(CheckFailure::Mismatch(detail)) => {
                assert!(detail.contains("[1] expected 2, got 0"));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn array_length_mismatch_is_a_failure() {
        let mut arena = Arena::new();
        let handle = arena.register_array(&[0; 3]);
        let snapshot = snapshot_with_array(handle.label(), 0x1000_0000, &[0, 0, 0]);
        let expectation = Expectation::Array { handle, expected: vec![0, 0] };
        assert!(check_state(&expectation, &snapshot).failed());
    }

    #[test]
    fn pointer_check_follows_register() {
        let mut snapshot = snapshot_with_array("heap", 0x1000_8000, &[1, 2, 3]);
        snapshot.registers.insert(Slot::A0, 0x1000_8000);
        let expectation = Expectation::ArrayViaPointer { slot: Slot::A0, expected: vec![1, 2, 3] };
        assert_eq!(check_state(&expectation, &snapshot).status, CheckStatus::Passed);
        let longer = Expectation::ArrayViaPointer { slot: Slot::A0, expected: vec![1, 2, 3, 4] };
        assert!(matches!(
            check_state(&longer, &snapshot).status,
            CheckStatus::Failed(CheckFailure::MissingState(_))
        ));
    }

    #[test]
    fn report_collects_every_failure() {
        let mut report = VerificationReport::new("relu::simple", 0, Some(0));
        let snapshot = StateSnapshot::default();
        report.push(check_state(&Expectation::Scalar { slot: Slot::A0, expected: 1 }, &snapshot));
        report.push(check_stdout("2\n", "3\n"));
        assert!(!report.passed());
        assert_eq!(report.failures().count(), 2);
        let text = report.to_string();
        assert!(text.contains("2 of 3 checks failed"));
        assert!(text.contains("stdout"));
    }

    #[test]
    #[should_panic(expected = "expected exit code 32, got 0")]
    fn assert_passed_panics_with_details() {
        VerificationReport::new("relu::error", 32, Some(0)).assert_passed();
    }

    #[test]
    fn file_checks_distinguish_missing_sides() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let actual = dir.path().join("student.bin");
        let reference = dir.path().join("reference.bin");

        assert!(matches!(
            check_file(&actual, &reference).status,
            CheckStatus::Failed(CheckFailure::MissingReference(_))
        ));
        std::fs::write(&reference, [2, 0, 0, 0]).unwrap();
        assert!(matches!(
            check_file(&actual, &reference).status,
            CheckStatus::Failed(CheckFailure::MissingOutput(_))
        ));
        std::fs::write(&actual, [2, 0, 1, 0]).unwrap();
        match check_file(&actual, &reference).status {
            CheckStatus::Failed(CheckFailure::Mismatch(detail)) => {
                assert!(detail.contains("offset 2"));
            }
            other => panic!("unexpected status {other:?}"),
        }
        std::fs::write(&actual, [2, 0, 0, 0]).unwrap();
        assert_eq!(check_file(&actual, &reference).status, CheckStatus::Passed);
    }

    #[test]
    fn mismatch_listing_is_bounded() {
        let expected = vec![0; 20];
        let actual = vec![1; 20];
        let detail = describe_mismatch(&expected, &actual).unwrap();
        assert!(detail.starts_with("20 elements differ"));
        assert!(detail.ends_with("and 12 more"));
        assert_eq!(describe_mismatch(&[1, 2], &[1, 2]), None);
    }
}
