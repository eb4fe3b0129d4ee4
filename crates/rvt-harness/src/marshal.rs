//! Host values to scratch-arena regions.
//!
//! Every array and filename a test registers gets its own region in the
//! program's data segment. Offsets only grow; word regions start on a 4-byte
//! boundary. Labels are assigned in allocation order so two tests that
//! register the same values in the same order produce the same data section.

use crate::error::HarnessError;
use rvt_core::{DataItem, WORD_BYTES, word_from_i64};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(0);

/// A word array in the scratch arena. Usable by value (its contents are
/// checked after the run) or by pointer (its address is loaded into a slot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayHandle {
    arena: u64,
    label: String,
    offset: u32,
    len: usize,
}

impl ArrayHandle {
    pub const ELEMENT_WIDTH: u32 = WORD_BYTES;

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileMode {
    Read,
    Write,
}

/// A filename embedded as a NUL-terminated string constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBinding {
    pub mode: FileMode,
    /// Path as the program sees it, relative to the engine's working dir.
    pub logical_name: String,
    pub label: String,
    pub offset: u32,
}

/// Arrays and filenames of one test. Each arena has a process-unique id
/// that its handles carry, so a handle from another test is rejected even
/// when its label and offset line up.
#[derive(Debug)]
pub struct Arena {
    id: u64,
    next_offset: u32,
    arrays: usize,
    paths: usize,
    items: Vec<DataItem>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            next_offset: 0,
            arrays: 0,
            paths: 0,
            items: Vec::new(),
        }
    }

    /// Checks that a host integer fits in one word.
    pub fn register_scalar(&self, value: i64) -> Result<i32, HarnessError> {
        word_from_i64(value).ok_or(HarnessError::ScalarOutOfRange { slot: None, value })
    }

    pub fn register_array(&mut self, values: &[i32]) -> ArrayHandle {
        let offset = self.next_offset.next_multiple_of(WORD_BYTES);
        let label = format!("rvt_array_{}", self.arrays);
        self.arrays += 1;
        let item = DataItem::Words {
            label: label.clone(),
            offset,
            values: values.to_vec(),
        };
        self.next_offset = offset + item.byte_len();
        self.items.push(item);
        ArrayHandle {
            arena: self.id,
            label,
            offset,
            len: values.len(),
        }
    }

    /// Write mode does not create the file; the routine under test does.
    pub fn register_filename(
        &mut self,
        name: &str,
        mode: FileMode,
    ) -> Result<FileBinding, HarnessError> {
        let reject = |reason| HarnessError::InvalidFilename {
            name: name.to_owned(),
            reason,
        };
        if name.is_empty() {
            return Err(reject("empty"));
        }
        if name.contains('\0') {
            return Err(reject("contains NUL"));
        }
        if name.contains('"') {
            return Err(reject("contains a double quote"));
        }
        if name.contains('\n') || name.contains('\r') {
            return Err(reject("contains a line break"));
        }

        let offset = self.next_offset;
        let label = format!("rvt_path_{}", self.paths);
        self.paths += 1;
        let item = DataItem::Text {
            label: label.clone(),
            offset,
            text: name.to_owned(),
        };
        self.next_offset = offset + item.byte_len();
        self.items.push(item);
        Ok(FileBinding {
            mode,
            logical_name: name.to_owned(),
            label,
            offset,
        })
    }

    /// Whether `handle` was issued by this arena.
    #[must_use]
    pub fn owns(&self, handle: &ArrayHandle) -> bool {
        handle.arena == self.id
            && self.items.iter().any(|item| match item {
                DataItem::Words {
                    label,
                    offset,
                    values,
                } => {
                    label == &handle.label
                        && *offset == handle.offset
                        && values.len() == handle.len
                }
                DataItem::Text { .. } => false,
            })
    }

    pub fn check_owned(&self, handle: &ArrayHandle) -> Result<(), HarnessError> {
        if self.owns(handle) {
            Ok(())
        } else {
            Err(HarnessError::UnknownHandle {
                label: handle.label.clone(),
            })
        }
    }

    #[must_use]
    pub fn items(&self) -> &[DataItem] {
        &self.items
    }

    /// Total bytes allocated so far.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.next_offset
    }
}
