#![forbid(unsafe_code)]

pub mod program;
pub mod result;
pub mod snapshot;

pub use program::{DataItem, DumpPlan, Program, RegionDump, SlotValue};
pub use result::{ExecutionResult, Termination};
pub use snapshot::{SNAPSHOT_SENTINEL, SnapshotError, StateSnapshot, split_snapshot};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Width in bytes of one marshaled cell.
pub const WORD_BYTES: u32 = 4;

/// Integer argument registers of the RISC-V calling convention.
///
/// `A0` doubles as the return slot. The derived ordering is the canonical
/// prologue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
}

impl Slot {
    pub const ALL: [Slot; 8] = [
        Slot::A0,
        Slot::A1,
        Slot::A2,
        Slot::A3,
        Slot::A4,
        Slot::A5,
        Slot::A6,
        Slot::A7,
    ];

    /// The return-value slot.
    pub const RETURN: Slot = Slot::A0;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A0 => "a0",
            Self::A1 => "a1",
            Self::A2 => "a2",
            Self::A3 => "a3",
            Self::A4 => "a4",
            Self::A5 => "a5",
            Self::A6 => "a6",
            Self::A7 => "a7",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSlot(pub String);

impl std::fmt::Display for UnknownSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown argument slot `{}` (expected a0..a7)", self.0)
    }
}

impl std::error::Error for UnknownSlot {}

impl FromStr for Slot {
    type Err = UnknownSlot;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == raw)
            .ok_or_else(|| UnknownSlot(raw.to_owned()))
    }
}

/// Converts a host integer into a 32-bit word.
///
/// Accepts the signed range and unsigned bit patterns up to `u32::MAX`;
/// anything else does not fit in one register.
#[must_use]
pub fn word_from_i64(value: i64) -> Option<i32> {
    if let Ok(word) = i32::try_from(value) {
        return Some(word);
    }
    u32::try_from(value).ok().map(|bits| bits as i32)
}

/// File-name-safe form of a test id: `TestAbs::zero` becomes `TestAbs__zero`.
#[must_use]
pub fn artifact_stem(test_id: &str) -> String {
    test_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Operations the execution engine can be told to fail on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPoint {
    Malloc,
    Fopen,
    Fread,
    Fwrite,
    Fclose,
}

impl FaultPoint {
    pub const ALL: [FaultPoint; 5] = [
        FaultPoint::Malloc,
        FaultPoint::Fopen,
        FaultPoint::Fread,
        FaultPoint::Fwrite,
        FaultPoint::Fclose,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malloc => "malloc",
            Self::Fopen => "fopen",
            Self::Fread => "fread",
            Self::Fwrite => "fwrite",
            Self::Fclose => "fclose",
        }
    }
}

impl std::fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultPoint {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        FaultPoint::ALL
            .into_iter()
            .find(|point| point.as_str() == raw)
            .ok_or_else(|| format!("unknown fault point `{raw}`"))
    }
}

/// Exit codes the routines under test use to report error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    Success,
    InvalidLength,
    InvalidStride,
    DimensionMismatch,
    ArgumentCount,
    MallocFailure,
    FopenFailure,
    FcloseFailure,
    FreadFailure,
    FwriteFailure,
}

impl ExitCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InvalidLength => 32,
            Self::InvalidStride => 33,
            Self::DimensionMismatch => 34,
            Self::ArgumentCount => 35,
            Self::MallocFailure => 48,
            Self::FopenFailure => 64,
            Self::FcloseFailure => 65,
            Self::FreadFailure => 66,
            Self::FwriteFailure => 67,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        [
            Self::Success,
            Self::InvalidLength,
            Self::InvalidStride,
            Self::DimensionMismatch,
            Self::ArgumentCount,
            Self::MallocFailure,
            Self::FopenFailure,
            Self::FcloseFailure,
            Self::FreadFailure,
            Self::FwriteFailure,
        ]
        .into_iter()
        .find(|known| known.code() == code)
    }

    /// The code a routine reports when `point` fails underneath it.
    #[must_use]
    pub const fn for_fault(point: FaultPoint) -> Self {
        match point {
            FaultPoint::Malloc => Self::MallocFailure,
            FaultPoint::Fopen => Self::FopenFailure,
            FaultPoint::Fread => Self::FreadFailure,
            FaultPoint::Fwrite => Self::FwriteFailure,
            FaultPoint::Fclose => Self::FcloseFailure,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(value: ExitCode) -> Self {
        value.code()
    }
}
