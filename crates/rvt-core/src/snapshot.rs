//! Post-execution state reported by the program epilogue.
//!
//! After the routine returns, the epilogue prints a sentinel line followed by
//! one record per line and a closing `end`:
//!
//! ```text
//! reg a0 42
//! sym rvt_array_0 268435456
//! mem 268435456 7
//! end
//! ```
//!
//! Everything before the sentinel is the routine's own stdout.

use crate::Slot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

pub const SNAPSHOT_SENTINEL: &str = "@@rvtest-snapshot@@";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub registers: BTreeMap<Slot, i32>,
    pub symbols: BTreeMap<String, u32>,
    pub memory: BTreeMap<u32, i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The sentinel was printed but the closing `end` never arrived.
    Truncated,
    Malformed { line: usize, content: String },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "state snapshot truncated before `end`"),
            Self::Malformed { line, content } => {
                write!(f, "malformed snapshot record at line {line}: `{content}`")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl StateSnapshot {
    #[must_use]
    pub fn register(&self, slot: Slot) -> Option<i32> {
        self.registers.get(&slot).copied()
    }

    #[must_use]
    pub fn symbol(&self, label: &str) -> Option<u32> {
        self.symbols.get(label).copied()
    }

    /// Reads `len` consecutive words. On a gap, returns the first address
    /// that was not captured.
    pub fn read_words(&self, address: u32, len: usize) -> Result<Vec<i32>, u32> {
        (0..len)
            .map(|index| {
                let at = address.wrapping_add(index as u32 * crate::WORD_BYTES);
                self.memory.get(&at).copied().ok_or(at)
            })
            .collect()
    }

    /// Records body in wire format, without the sentinel.
    #[must_use]
    pub fn to_records(&self) -> String {
        let mut out = String::new();
        for (slot, value) in &self.registers {
            let _ = writeln!(out, "reg {slot} {value}");
        }
        for (label, address) in &self.symbols {
            let _ = writeln!(out, "sym {label} {}", *address as i32);
        }
        for (address, value) in &self.memory {
            let _ = writeln!(out, "mem {} {value}", *address as i32);
        }
        out.push_str("end\n");
        out
    }

    /// Full epilogue output: sentinel line plus records.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("\n{SNAPSHOT_SENTINEL}\n{}", self.to_records())
    }

    /// Parses records up to `end`. A final record without its newline was
    /// cut off mid-write and counts as truncation, not as malformed.
    pub fn parse_records(body: &str) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::default();
        for (index, chunk) in body.split_inclusive('\n').enumerate() {
            let raw = chunk.trim_end_matches(['\n', '\r']);
            let line = raw.trim();
            if line == "end" {
                return Ok(snapshot);
            }
            if !chunk.ends_with('\n') {
                return Err(SnapshotError::Truncated);
            }
            if line.is_empty() {
                continue;
            }
            let malformed = || SnapshotError::Malformed {
                line: index + 1,
                content: raw.to_owned(),
            };
            let fields = line.split_whitespace().collect::<Vec<_>>();
            match fields.as_slice() {
                ["reg", slot, value] => {
                    let slot = slot.parse::<Slot>().map_err(|_| malformed())?;
                    let value = parse_word(value).ok_or_else(malformed)?;
                    snapshot.registers.insert(slot, value);
                }
                ["sym", label, address] => {
                    let address = parse_word(address).ok_or_else(malformed)?;
                    snapshot.symbols.insert((*label).to_owned(), address as u32);
                }
                ["mem", address, value] => {
                    let address = parse_word(address).ok_or_else(malformed)?;
                    let value = parse_word(value).ok_or_else(malformed)?;
                    snapshot.memory.insert(address as u32, value);
                }
                _ => return Err(malformed()),
            }
        }
        Err(SnapshotError::Truncated)
    }
}

fn parse_word(raw: &str) -> Option<i32> {
    raw.parse::<i64>().ok().and_then(crate::word_from_i64)
}

/// Separates the routine's stdout from the epilogue snapshot.
///
/// Returns the stdout unchanged and `None` when no sentinel was printed,
/// i.e. the program terminated before the epilogue ran.
pub fn split_snapshot(raw: &str) -> Result<(String, Option<StateSnapshot>), SnapshotError> {
    let marker = format!("\n{SNAPSHOT_SENTINEL}\n");
    match raw.rfind(&marker) {
        Some(at) => {
            let snapshot = StateSnapshot::parse_records(&raw[at + marker.len()..])?;
            Ok((raw[..at].to_owned(), Some(snapshot)))
        }
        None => Ok((raw.to_owned(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::{SNAPSHOT_SENTINEL, SnapshotError, StateSnapshot, split_snapshot};
    use crate::Slot;
    use proptest::prelude::*;

    #[test]
    fn split_keeps_program_stdout_exact() {
        let raw = format!("2\n\n{SNAPSHOT_SENTINEL}\nreg a0 2\nend\n");
        let (stdout, snapshot) = split_snapshot(&raw).unwrap();
        assert_eq!(stdout, "2\n");
        assert_eq!(snapshot.unwrap().register(Slot::A0), Some(2));
    }

    #[test]
    fn missing_sentinel_means_no_snapshot() {
        let (stdout, snapshot) = split_snapshot("exiting early").unwrap();
        assert_eq!(stdout, "exiting early");
        assert!(snapshot.is_none());
    }

    #[test]
    fn truncated_snapshot_is_an_error() {
        let raw = format!("\n{SNAPSHOT_SENTINEL}\nreg a0 1\nmem 268435456 ");
        assert_eq!(split_snapshot(&raw).unwrap_err(), SnapshotError::Truncated);
    }

    #[test]
    fn record_cut_mid_line_is_truncated() {
        for body in ["reg a0 1\nmem 268435456 ", "reg a0 1\nre", "reg a0 1\nbogus"] {
            assert_eq!(
                StateSnapshot::parse_records(body).unwrap_err(),
                SnapshotError::Truncated,
                "{body:?}"
            );
        }
        assert!(StateSnapshot::parse_records("reg a0 1\nend").is_ok());
    }

    #[test]
    fn malformed_record_reports_line() {
        let err = StateSnapshot::parse_records("reg a0 1\nbogus\nend\n").unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed { line: 2, .. }));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn addresses_above_signed_range_survive() {
        let body = "sym rvt_array_0 -2147483648\nmem -2147483648 9\nend\n";
        let snapshot = StateSnapshot::parse_records(body).unwrap();
        assert_eq!(snapshot.symbol("rvt_array_0"), Some(0x8000_0000));
        assert_eq!(snapshot.read_words(0x8000_0000, 1), Ok(vec![9]));
    }

    #[test]
    fn read_words_reports_first_gap() {
        let body = "mem 100 1\nmem 104 2\nend\n";
        let snapshot = StateSnapshot::parse_records(body).unwrap();
        assert_eq!(snapshot.read_words(100, 2), Ok(vec![1, 2]));
        assert_eq!(snapshot.read_words(100, 3), Err(108));
    }

    proptest! {
        #[test]
        fn prop_wire_format_round_trips(
            regs in proptest::collection::btree_map(0usize..8, any::<i32>(), 0..8),
            words in proptest::collection::btree_map(any::<u32>(), any::<i32>(), 0..32),
            stdout in "[a-z0-9 \n]{0,40}",
        ) {
            let mut snapshot = StateSnapshot::default();
            for (index, value) in regs {
                snapshot.registers.insert(Slot::ALL[index], value);
            }
            snapshot.memory = words;
            snapshot.symbols.insert("rvt_array_0".to_owned(), 0x1000_0000);

            let raw = format!("{stdout}{}", snapshot.to_wire());
            let (parsed_stdout, parsed) = split_snapshot(&raw).unwrap();
            prop_assert_eq!(parsed_stdout, stdout);
            prop_assert_eq!(parsed, Some(snapshot));
        }
    }
}
