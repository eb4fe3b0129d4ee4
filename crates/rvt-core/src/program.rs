//! The synthesized test program.
//!
//! A `Program` is plain data: what to import, what to place in the data
//! segment, which slots to load, which routine to call and what state the
//! epilogue reports back. `render()` lowers it to Venus-dialect RISC-V text;
//! in-process engines consume the structured form directly.

use crate::snapshot::SNAPSHOT_SENTINEL;
use crate::{Slot, WORD_BYTES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};

const WORDS_PER_LINE: usize = 16;

/// A region of the per-test scratch arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataItem {
    Words {
        label: String,
        offset: u32,
        values: Vec<i32>,
    },
    Text {
        label: String,
        offset: u32,
        text: String,
    },
}

impl DataItem {
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Words { label, .. } | Self::Text { label, .. } => label,
        }
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        match self {
            Self::Words { offset, .. } | Self::Text { offset, .. } => *offset,
        }
    }

    /// Size in bytes, including the terminating NUL of text items.
    #[must_use]
    pub fn byte_len(&self) -> u32 {
        match self {
            Self::Words { values, .. } => values.len() as u32 * WORD_BYTES,
            Self::Text { text, .. } => text.len() as u32 + 1,
        }
    }
}

/// What the prologue materializes into a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotValue {
    Immediate(i32),
    Address(String),
}

/// A memory range the epilogue reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionDump {
    /// `len` words starting at a data label.
    Symbol { label: String, len: u32 },
    /// `len` words starting at the address a slot holds after the call.
    Pointer { slot: Slot, len: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpPlan {
    pub registers: BTreeSet<Slot>,
    pub regions: Vec<RegionDump>,
}

impl DumpPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty() && self.regions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Test identifier; engines use it to name the emitted file.
    pub name: String,
    /// Routine under test first, then dependencies in include order.
    pub imports: Vec<PathBuf>,
    /// Runtime library (malloc, file I/O wrappers). `None` for programs that
    /// link their own.
    pub runtime: Option<PathBuf>,
    pub data: Vec<DataItem>,
    /// Slot loads in canonical slot order.
    pub bindings: Vec<(Slot, SlotValue)>,
    pub routine: String,
    pub dump: DumpPlan,
}

impl Program {
    /// Entry label of the synthesized driver. Renamed when the routine under
    /// test is itself `main`.
    #[must_use]
    pub fn entry_label(&self) -> &'static str {
        if self.routine == "main" {
            "rvt_main"
        } else {
            "main"
        }
    }

    /// Every source the program links, runtime last.
    pub fn linked_sources(&self) -> impl Iterator<Item = &Path> {
        self.imports
            .iter()
            .map(PathBuf::as_path)
            .chain(self.runtime.as_deref())
    }

    /// File names of the linked sources, e.g. `dot.s`.
    #[must_use]
    pub fn linked_file_names(&self) -> BTreeSet<String> {
        self.linked_sources()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }

    #[must_use]
    pub fn data_item(&self, label: &str) -> Option<&DataItem> {
        self.data.iter().find(|item| item.label() == label)
    }

    /// Copy of this program linked against a different runtime library.
    #[must_use]
    pub fn with_runtime(&self, runtime: Option<PathBuf>) -> Self {
        Self {
            runtime,
            ..self.clone()
        }
    }

    /// Lower to assembly text. Output is a pure function of the program.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# rvtest program `{}` calling `{}`", self.name, self.routine);
        for source in self.linked_sources() {
            let _ = writeln!(out, ".import {}", source.display());
        }

        out.push_str("\n.data\n");
        for item in &self.data {
            render_data_item(&mut out, item);
        }
        self.render_snapshot_strings(&mut out);

        out.push_str("\n.text\n");
        let entry = self.entry_label();
        if entry == "main" {
            out.push_str(".globl main\n");
        }
        let _ = writeln!(out, "{entry}:");
        for (slot, value) in &self.bindings {
            match value {
                SlotValue::Immediate(word) => {
                    let _ = writeln!(out, "    li {slot}, {word}");
                }
                SlotValue::Address(label) => {
                    let _ = writeln!(out, "    la {slot}, {label}");
                }
            }
        }
        let _ = writeln!(out, "    jal ra, {}", self.routine);
        self.render_epilogue(&mut out);
        render_dump_words_helper(&mut out);
        out
    }

    fn render_snapshot_strings(&self, out: &mut String) {
        out.push_str(".align 2\n");
        out.push_str("rvt_saved_regs: .word 0, 0, 0, 0, 0, 0, 0, 0\n");
        let _ = writeln!(
            out,
            "rvt_snapshot_begin: .asciiz \"\\n{SNAPSHOT_SENTINEL}\\n\""
        );
        out.push_str("rvt_snapshot_end: .asciiz \"end\\n\"\n");
        out.push_str("rvt_tag_mem: .asciiz \"mem \"\n");
        for slot in &self.dump.registers {
            let _ = writeln!(out, "rvt_tag_reg_{slot}: .asciiz \"reg {slot} \"");
        }
        for (index, region) in self.dump.regions.iter().enumerate() {
            if let RegionDump::Symbol { label, .. } = region {
                let _ = writeln!(out, "rvt_tag_sym_{index}: .asciiz \"sym {label} \"");
            }
        }
    }

    fn render_epilogue(&self, out: &mut String) {
        out.push_str("    la t0, rvt_saved_regs\n");
        for slot in Slot::ALL {
            let _ = writeln!(out, "    sw {slot}, {}(t0)", slot.index() as u32 * WORD_BYTES);
        }
        print_string(out, "rvt_snapshot_begin");
        for slot in &self.dump.registers {
            print_string(out, &format!("rvt_tag_reg_{slot}"));
            out.push_str("    la t0, rvt_saved_regs\n");
            let _ = writeln!(out, "    lw a1, {}(t0)", slot.index() as u32 * WORD_BYTES);
            out.push_str("    li a0, 1\n    ecall\n");
            print_char(out, b'\n');
        }
        for (index, region) in self.dump.regions.iter().enumerate() {
            match region {
                RegionDump::Symbol { label, len } => {
                    print_string(out, &format!("rvt_tag_sym_{index}"));
                    let _ = writeln!(out, "    la a1, {label}");
                    out.push_str("    li a0, 1\n    ecall\n");
                    print_char(out, b'\n');
                    let _ = writeln!(out, "    la t1, {label}");
                    let _ = writeln!(out, "    li t2, {len}");
                }
                RegionDump::Pointer { slot, len } => {
                    out.push_str("    la t0, rvt_saved_regs\n");
                    let _ = writeln!(out, "    lw t1, {}(t0)", slot.index() as u32 * WORD_BYTES);
                    let _ = writeln!(out, "    li t2, {len}");
                }
            }
            out.push_str("    jal ra, rvt_dump_words\n");
        }
        print_string(out, "rvt_snapshot_end");
        out.push_str("    li a0, 10\n    ecall\n");
    }
}

fn render_data_item(out: &mut String, item: &DataItem) {
    match item {
        DataItem::Words { label, values, .. } => {
            out.push_str(".align 2\n");
            if values.is_empty() {
                let _ = writeln!(out, "{label}:");
                return;
            }
            for (index, chunk) in values.chunks(WORDS_PER_LINE).enumerate() {
                let joined = chunk
                    .iter()
                    .map(i32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                if index == 0 {
                    let _ = writeln!(out, "{label}: .word {joined}");
                } else {
                    let _ = writeln!(out, "    .word {joined}");
                }
            }
        }
        DataItem::Text { label, text, .. } => {
            let _ = writeln!(out, "{label}: .asciiz \"{}\"", escape_asciiz(text));
        }
    }
}

fn escape_asciiz(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn print_string(out: &mut String, label: &str) {
    let _ = writeln!(out, "    li a0, 4\n    la a1, {label}\n    ecall");
}

fn print_char(out: &mut String, ch: u8) {
    let _ = writeln!(out, "    li a0, 11\n    li a1, {ch}\n    ecall");
}

// t1 = address, t2 = word count. Emits one `mem <addr> <value>` line per word.
fn render_dump_words_helper(out: &mut String) {
    out.push_str("\nrvt_dump_words:\n");
    out.push_str("    beq t2, x0, rvt_dump_words_done\n");
    print_string(out, "rvt_tag_mem");
    out.push_str("    mv a1, t1\n    li a0, 1\n    ecall\n");
    print_char(out, b' ');
    out.push_str("    lw a1, 0(t1)\n    li a0, 1\n    ecall\n");
    print_char(out, b'\n');
    out.push_str("    addi t1, t1, 4\n    addi t2, t2, -1\n    j rvt_dump_words\n");
    out.push_str("rvt_dump_words_done:\n    jr ra\n");
}
