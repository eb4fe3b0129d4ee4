//! In-process engine: runs a `Program` on the host.
//!
//! The host engine does not decode instructions. It lays out the program's
//! data segment in an emulated 32-bit address space, loads the slot
//! bindings, and dispatches the call target to a registered Rust routine.
//! Routines see the machine through `HostMachine`: argument registers, word
//! memory, a bump allocator, file I/O and stdout, with the same failure
//! conventions as the simulator runtime library (malloc returns 0, fopen
//! returns -1, short reads and writes, fclose returns -1).

use crate::{Engine, EngineError, LinkReport, RunRequest, UnresolvedCall};
use rvt_core::{
    DataItem, DumpPlan, ExecutionResult, FaultPoint, Program, RegionDump, Slot, SlotValue,
    StateSnapshot, Termination, WORD_BYTES, split_snapshot,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

pub const DATA_BASE: u32 = 0x1000_0000;
pub const HEAP_BASE: u32 = 0x1000_8000;
/// The heap ends 64 MiB above its base.
pub const HEAP_LIMIT: u32 = HEAP_BASE + (64 << 20);
pub const ARGV_BASE: u32 = 0x7000_0000;
pub const STACK_TOP: u32 = 0x7FFF_FFF0;

/// Largest single `malloc`; bigger requests trap.
pub const MAX_ALLOCATION_BYTES: u32 = 1 << 20;

const MAX_CALL_DEPTH: usize = 64;
const FIRST_FD: i32 = 3;

/// Why a host routine stopped before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostExit {
    /// `exit2`-style termination with a code.
    Exit(i32),
    /// The equivalent of a simulator runtime error.
    Trap(String),
}

impl std::fmt::Display for HostExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit(code) => write!(f, "exit({code})"),
            Self::Trap(detail) => write!(f, "trap: {detail}"),
        }
    }
}

type HostFn = dyn Fn(&mut HostMachine<'_>) -> Result<(), HostExit> + Send + Sync;

/// A routine the host engine can call, named like its assembly label.
pub struct HostRoutine {
    name: String,
    source: String,
    calls: Vec<String>,
    links: Vec<String>,
    func: Box<HostFn>,
}

impl HostRoutine {
    /// `source` is the file that defines the routine, e.g. `relu.s`.
    pub fn new<F>(name: &str, source: &str, func: F) -> Self
    where
        F: Fn(&mut HostMachine<'_>) -> Result<(), HostExit> + Send + Sync + 'static,
    {
        HostRoutine {
            name: name.to_owned(),
            source: source.to_owned(),
            calls: Vec::new(),
            links: Vec::new(),
            func: Box::new(func),
        }
    }

    /// Routines this one calls; each must be linked by the test.
    #[must_use]
    pub fn calls(mut self, callees: &[&str]) -> Self {
        self.calls = callees.iter().map(|name| (*name).to_owned()).collect();
        self
    }

    /// Sources this routine's file imports itself.
    #[must_use]
    pub fn links(mut self, sources: &[&str]) -> Self {
        self.links = sources.iter().map(|name| (*name).to_owned()).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Debug for HostRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRoutine")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("calls", &self.calls)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct HostRegistry {
    routines: Vec<HostRoutine>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, routine: HostRoutine) -> Result<(), EngineError> {
        if self.routines.iter().any(|known| known.name == routine.name) {
            return Err(EngineError::Launch {
                command: "host-register".to_owned(),
                detail: format!("routine `{}` registered twice", routine.name),
            });
        }
        self.routines.push(routine);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&HostRoutine, EngineError> {
        self.routines
            .iter()
            .find(|routine| routine.name == name)
            .ok_or_else(|| EngineError::UnknownRoutine {
                name: name.to_owned(),
                available: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.routines.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// File names visible to a program: its own sources plus whatever the
    /// linked routine files import themselves.
    fn linked_sources(&self, program: &Program) -> BTreeSet<String> {
        let mut linked = program.linked_file_names();
        for routine in &self.routines {
            if linked.contains(&routine.source) {
                linked.extend(routine.links.iter().cloned());
            }
        }
        linked
    }
}

pub struct HostEngine {
    registry: HostRegistry,
    work_dir: PathBuf,
}

impl HostEngine {
    /// File paths the routines open are resolved against `work_dir`.
    #[must_use]
    pub fn new(registry: HostRegistry, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            work_dir: work_dir.into(),
        }
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }
}

impl Engine for HostEngine {
    fn name(&self) -> &str {
        "host"
    }

    fn version(&self) -> String {
        format!("rvt-runtime-host/{}", env!("CARGO_PKG_VERSION"))
    }

    fn run(
        &self,
        program: &Program,
        request: &RunRequest,
    ) -> Result<ExecutionResult, EngineError> {
        self.registry.get(&program.routine)?;
        if let Some(fault) = request.fault
            && program.runtime.is_none()
        {
            return Err(EngineError::FaultUnsupported {
                fault,
                detail: "program links no runtime library".to_owned(),
            });
        }

        let mut machine = HostMachine {
            registry: &self.registry,
            linked: self.registry.linked_sources(program),
            work_dir: self.work_dir.clone(),
            regs: [0; 8],
            memory: BTreeMap::new(),
            zeroed: Vec::new(),
            symbols: BTreeMap::new(),
            heap_next: HEAP_BASE,
            stack_next: STACK_TOP,
            files: BTreeMap::new(),
            next_fd: FIRST_FD,
            stdout: String::new(),
            fault: request.fault,
            fault_fired: false,
            depth: 0,
        };
        machine.load(program, &request.args);
        log::debug!(
            "host engine running `{}` (fault={:?}, args={:?})",
            program.routine,
            request.fault,
            request.args
        );

        let outcome = machine.call(&program.routine);
        machine.close_all();
        let (termination, raw_stdout) = match outcome {
            Ok(()) => {
                let snapshot = machine.capture(&program.dump);
                let raw = format!("{}{}", machine.stdout, snapshot.to_wire());
                (Termination::Exited(0), raw)
            }
            Err(HostExit::Exit(code)) => (Termination::Exited(code), machine.stdout.clone()),
            Err(HostExit::Trap(detail)) => (Termination::Crashed(detail), machine.stdout.clone()),
        };

        let (stdout, snapshot) = match split_snapshot(&raw_stdout) {
            Ok(parts) => parts,
            Err(err) => {
                return Ok(ExecutionResult {
                    termination: Termination::Crashed(err.to_string()),
                    stdout: raw_stdout,
                    stderr: String::new(),
                    snapshot: None,
                    command: None,
                    program_path: None,
                });
            }
        };
        Ok(ExecutionResult {
            termination,
            stdout,
            stderr: String::new(),
            snapshot,
            command: None,
            program_path: None,
        })
    }

    fn link_report(&self, program: &Program) -> Option<LinkReport> {
        let linked = self.registry.linked_sources(program);
        let mut report = LinkReport::default();
        match self.registry.get(&program.routine) {
            Ok(target) if linked.contains(&target.source) => {}
            _ => report.unresolved.push(UnresolvedCall {
                caller: program.entry_label().to_owned(),
                symbol: program.routine.clone(),
            }),
        }
        for routine in &self.registry.routines {
            if !linked.contains(&routine.source) {
                continue;
            }
            for callee in &routine.calls {
                let resolved = self
                    .registry
                    .get(callee)
                    .is_ok_and(|target| linked.contains(&target.source));
                if !resolved {
                    report.unresolved.push(UnresolvedCall {
                        caller: routine.name.clone(),
                        symbol: callee.clone(),
                    });
                }
            }
        }
        Some(report)
    }
}

struct HostFile {
    path: PathBuf,
    handle: File,
}

/// Machine state visible to host routines during one run.
pub struct HostMachine<'a> {
    registry: &'a HostRegistry,
    linked: BTreeSet<String>,
    work_dir: PathBuf,
    regs: [i32; 8],
    memory: BTreeMap<u32, u8>,
    /// Allocated `[start, end)` ranges that read as zero until written.
    zeroed: Vec<(u32, u32)>,
    symbols: BTreeMap<String, u32>,
    heap_next: u32,
    stack_next: u32,
    files: BTreeMap<i32, HostFile>,
    next_fd: i32,
    stdout: String,
    fault: Option<FaultPoint>,
    fault_fired: bool,
    depth: usize,
}

impl HostMachine<'_> {
    fn load(&mut self, program: &Program, args: &[String]) {
        let mut data_end = DATA_BASE;
        for item in &program.data {
            let address = DATA_BASE + item.offset();
            self.symbols.insert(item.label().to_owned(), address);
            match item {
                DataItem::Words { values, .. } => {
                    for (index, value) in values.iter().enumerate() {
                        self.write_bytes(address + index as u32 * WORD_BYTES, &value.to_le_bytes());
                    }
                }
                DataItem::Text { text, .. } => {
                    self.write_bytes(address, text.as_bytes());
                    self.write_bytes(address + text.len() as u32, &[0]);
                }
            }
            data_end = data_end.max(address + item.byte_len());
        }
        self.heap_next = HEAP_BASE.max(data_end.next_multiple_of(16));

        // argv[0] is the program itself, as the simulator passes it.
        let argv = std::iter::once(format!("{}.s", program.name))
            .chain(args.iter().cloned())
            .collect::<Vec<_>>();
        let mut cursor = ARGV_BASE + (argv.len() as u32 + 1) * WORD_BYTES;
        for (index, arg) in argv.iter().enumerate() {
            self.write_bytes(ARGV_BASE + index as u32 * WORD_BYTES, &cursor.to_le_bytes());
            self.write_bytes(cursor, arg.as_bytes());
            self.write_bytes(cursor + arg.len() as u32, &[0]);
            cursor = (cursor + arg.len() as u32 + 1).next_multiple_of(WORD_BYTES);
        }
        self.write_bytes(ARGV_BASE + argv.len() as u32 * WORD_BYTES, &0u32.to_le_bytes());
        self.regs[Slot::A0.index()] = argv.len() as i32;
        self.regs[Slot::A1.index()] = ARGV_BASE as i32;

        for (slot, value) in &program.bindings {
            self.regs[slot.index()] = match value {
                SlotValue::Immediate(word) => *word,
                SlotValue::Address(label) => self.symbols.get(label).copied().unwrap_or(0) as i32,
            };
        }
    }

    fn capture(&self, plan: &DumpPlan) -> StateSnapshot {
        let mut snapshot = StateSnapshot::default();
        for slot in &plan.registers {
            snapshot.registers.insert(*slot, self.reg(*slot));
        }
        for region in &plan.regions {
            let (start, len) = match region {
                RegionDump::Symbol { label, len } => {
                    let Some(address) = self.symbols.get(label).copied() else {
                        continue;
                    };
                    snapshot.symbols.insert(label.clone(), address);
                    (address, *len)
                }
                RegionDump::Pointer { slot, len } => (self.reg(*slot) as u32, *len),
            };
            for index in 0..len {
                let address = start.wrapping_add(index * WORD_BYTES);
                match self.peek_word(address) {
                    Some(value) => {
                        snapshot.memory.insert(address, value);
                    }
                    None => break,
                }
            }
        }
        snapshot
    }

    fn close_all(&mut self) {
        for (_, mut file) in std::mem::take(&mut self.files) {
            let _ = file.handle.flush();
        }
    }

    fn trip(&mut self, point: FaultPoint) -> bool {
        if self.fault == Some(point) && !self.fault_fired {
            self.fault_fired = true;
            log::debug!("host engine injecting {point} failure");
            return true;
        }
        false
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        for (index, byte) in bytes.iter().enumerate() {
            self.memory.insert(address.wrapping_add(index as u32), *byte);
        }
    }

    fn byte_at(&self, address: u32) -> Option<u8> {
        self.memory.get(&address).copied().or_else(|| {
            self.zeroed
                .iter()
                .any(|(start, end)| (*start..*end).contains(&address))
                .then_some(0)
        })
    }

    fn peek_word(&self, address: u32) -> Option<i32> {
        let mut bytes = [0u8; 4];
        for (index, byte) in bytes.iter_mut().enumerate() {
            *byte = self.byte_at(address.wrapping_add(index as u32))?;
        }
        Some(i32::from_le_bytes(bytes))
    }

    // ── registers ──────────────────────────────────────────────────

    #[must_use]
    pub fn reg(&self, slot: Slot) -> i32 {
        self.regs[slot.index()]
    }

    pub fn set_reg(&mut self, slot: Slot, value: i32) {
        self.regs[slot.index()] = value;
    }

    // ── memory ─────────────────────────────────────────────────────

    pub fn load_word(&self, address: u32) -> Result<i32, HostExit> {
        if address % WORD_BYTES != 0 {
            return Err(HostExit::Trap(format!("misaligned load at {address:#010x}")));
        }
        self.peek_word(address)
            .ok_or_else(|| HostExit::Trap(format!("load from unmapped address {address:#010x}")))
    }

    pub fn store_word(&mut self, address: u32, value: i32) -> Result<(), HostExit> {
        if address % WORD_BYTES != 0 {
            return Err(HostExit::Trap(format!("misaligned store at {address:#010x}")));
        }
        if address < DATA_BASE {
            return Err(HostExit::Trap(format!("store to protected address {address:#010x}")));
        }
        self.write_bytes(address, &value.to_le_bytes());
        Ok(())
    }

    pub fn load_words(&self, address: u32, len: usize) -> Result<Vec<i32>, HostExit> {
        (0..len)
            .map(|index| self.load_word(address.wrapping_add(index as u32 * WORD_BYTES)))
            .collect()
    }

    pub fn store_words(&mut self, address: u32, values: &[i32]) -> Result<(), HostExit> {
        for (index, value) in values.iter().enumerate() {
            self.store_word(address.wrapping_add(index as u32 * WORD_BYTES), *value)?;
        }
        Ok(())
    }

    /// Reads a NUL-terminated string.
    pub fn load_cstr(&self, address: u32) -> Result<String, HostExit> {
        let mut bytes = Vec::new();
        let mut cursor = address;
        loop {
            let byte = self.byte_at(cursor).ok_or_else(|| {
                HostExit::Trap(format!("string read from unmapped address {cursor:#010x}"))
            })?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            cursor = cursor.wrapping_add(1);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Word-aligned scratch space below the stack pointer. Traps when the
    /// stack would run into the heap.
    pub fn stack_alloc(&mut self, bytes: u32) -> Result<u32, HostExit> {
        let base = bytes
            .checked_next_multiple_of(WORD_BYTES)
            .and_then(|size| self.stack_next.checked_sub(size))
            .filter(|base| *base >= self.heap_next)
            .ok_or_else(|| HostExit::Trap(format!("stack overflow allocating {bytes} bytes")))?;
        self.zeroed.push((base, self.stack_next));
        self.stack_next = base;
        Ok(base)
    }

    // ── runtime library ────────────────────────────────────────────

    /// Returns 0 when the allocation fails.
    pub fn malloc(&mut self, bytes: i32) -> Result<u32, HostExit> {
        if bytes < 0 {
            return Err(HostExit::Trap(format!("malloc of negative size {bytes}")));
        }
        if self.trip(FaultPoint::Malloc) {
            return Ok(0);
        }
        if bytes as u32 > MAX_ALLOCATION_BYTES {
            return Err(HostExit::Trap(format!(
                "malloc of {bytes} bytes exceeds the {MAX_ALLOCATION_BYTES}-byte limit"
            )));
        }
        let base = self.heap_next;
        let size = (bytes as u32).next_multiple_of(WORD_BYTES).max(WORD_BYTES);
        let end = base
            .checked_add(size)
            .filter(|end| *end <= HEAP_LIMIT)
            .ok_or_else(|| HostExit::Trap(format!("heap exhausted allocating {bytes} bytes")))?;
        self.zeroed.push((base, end));
        self.heap_next = end;
        Ok(base)
    }

    pub fn free(&mut self, _address: u32) {}

    /// `mode` 0 reads, 1 writes, 2 appends. Returns -1 on failure.
    pub fn fopen(&mut self, path_address: u32, mode: i32) -> Result<i32, HostExit> {
        let logical = self.load_cstr(path_address)?;
        if self.trip(FaultPoint::Fopen) {
            return Ok(-1);
        }
        let path = self.work_dir.join(&logical);
        let opened = match mode {
            0 => File::open(&path),
            1 => File::create(&path),
            2 => OpenOptions::new().append(true).create(true).open(&path),
            _ => return Ok(-1),
        };
        match opened {
            Ok(handle) => {
                let fd = self.next_fd;
                self.next_fd += 1;
                self.files.insert(fd, HostFile { path, handle });
                Ok(fd)
            }
            Err(err) => {
                log::debug!("host fopen({}) failed: {err}", path.display());
                Ok(-1)
            }
        }
    }

    /// Returns the number of bytes read, or -1.
    pub fn fread(&mut self, fd: i32, buffer: u32, bytes: i32) -> Result<i32, HostExit> {
        if self.trip(FaultPoint::Fread) {
            return Ok(-1);
        }
        let Some(file) = self.files.get_mut(&fd) else {
            return Ok(-1);
        };
        let mut data = Vec::new();
        if Read::take(&mut file.handle, bytes.max(0) as u64)
            .read_to_end(&mut data)
            .is_err()
        {
            return Ok(-1);
        }
        self.write_bytes(buffer, &data);
        Ok(data.len() as i32)
    }

    /// Returns the number of items written.
    pub fn fwrite(&mut self, fd: i32, buffer: u32, items: i32, size: i32) -> Result<i32, HostExit> {
        if self.trip(FaultPoint::Fwrite) {
            return Ok(0);
        }
        let total = (items.max(0) as u32)
            .checked_mul(size.max(0) as u32)
            .ok_or_else(|| {
                HostExit::Trap(format!("fwrite of {items} items of {size} bytes overflows"))
            })?;
        let mut data = Vec::with_capacity(total.min(MAX_ALLOCATION_BYTES) as usize);
        for offset in 0..total {
            let address = buffer.wrapping_add(offset);
            let byte = self.byte_at(address).ok_or_else(|| {
                HostExit::Trap(format!("fwrite from unmapped address {address:#010x}"))
            })?;
            data.push(byte);
        }
        let Some(file) = self.files.get_mut(&fd) else {
            return Ok(0);
        };
        match file.handle.write_all(&data) {
            Ok(()) => Ok(items),
            Err(err) => {
                log::debug!("host fwrite({}) failed: {err}", file.path.display());
                Ok(0)
            }
        }
    }

    /// Returns 0 on success, -1 on failure.
    pub fn fclose(&mut self, fd: i32) -> Result<i32, HostExit> {
        if self.trip(FaultPoint::Fclose) {
            return Ok(-1);
        }
        match self.files.remove(&fd) {
            Some(mut file) => Ok(if file.handle.flush().is_ok() { 0 } else { -1 }),
            None => Ok(-1),
        }
    }

    pub fn print_int(&mut self, value: i32) {
        self.stdout.push_str(&value.to_string());
    }

    pub fn print_char(&mut self, ch: char) {
        self.stdout.push(ch);
    }

    pub fn print_str(&mut self, address: u32) -> Result<(), HostExit> {
        let text = self.load_cstr(address)?;
        self.stdout.push_str(&text);
        Ok(())
    }

    #[must_use]
    pub fn exit(&self, code: i32) -> HostExit {
        HostExit::Exit(code)
    }

    /// Calls another routine with the current register contents.
    pub fn call(&mut self, name: &str) -> Result<(), HostExit> {
        let registry = self.registry;
        let routine = registry
            .get(name)
            .map_err(|_| HostExit::Trap(format!("call to undefined symbol `{name}`")))?;
        if !self.linked.contains(&routine.source) {
            return Err(HostExit::Trap(format!(
                "unresolved symbol `{name}`: {} is not linked",
                routine.source
            )));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(HostExit::Trap(format!("call depth exceeded at `{name}`")));
        }
        self.depth += 1;
        let outcome = (routine.func)(self);
        self.depth -= 1;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DATA_BASE, HostEngine, HostExit, HostRegistry, HostRoutine, MAX_ALLOCATION_BYTES,
    };
    use crate::{Engine, EngineError, RunRequest};
    use rvt_core::{
        DataItem, DumpPlan, FaultPoint, Program, RegionDump, Slot, SlotValue, Termination,
    };
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn program(routine: &str, source: &str) -> Program {
        Program {
            name: format!("host_{routine}"),
            imports: vec![PathBuf::from(source)],
            runtime: Some(PathBuf::from("utils.s")),
            data: vec![DataItem::Words {
                label: "rvt_array_0".to_owned(),
                offset: 0,
                values: vec![4, -5, 6],
            }],
            bindings: vec![
                (Slot::A0, SlotValue::Address("rvt_array_0".to_owned())),
                (Slot::A1, SlotValue::Immediate(3)),
            ],
            routine: routine.to_owned(),
            dump: DumpPlan::default(),
        }
    }

    fn registry() -> HostRegistry {
        let mut registry = HostRegistry::new();
        registry
            .register(HostRoutine::new("negate_all", "negate_all.s", |m| {
                let base = m.reg(Slot::A0) as u32;
                let len = m.reg(Slot::A1);
                if len < 1 {
                    return Err(m.exit(32));
                }
                let values = m.load_words(base, len as usize)?;
                let negated = values.iter().map(|v| v.wrapping_neg()).collect::<Vec<_>>();
                m.store_words(base, &negated)?;
                m.set_reg(Slot::A0, negated[0]);
                Ok(())
            }))
            .unwrap();
        registry
            .register(
                HostRoutine::new("twice", "twice.s", |m| {
                    m.call("negate_all")?;
                    m.set_reg(Slot::A0, DATA_BASE as i32);
                    m.call("negate_all")
                })
                .calls(&["negate_all"]),
            )
            .unwrap();
        registry
            .register(HostRoutine::new("touch", "touch.s", |m| {
                let buffer = m.malloc(4)?;
                if buffer == 0 {
                    return Err(m.exit(48));
                }
                let fd = m.fopen(m.reg(Slot::A0) as u32, 1)?;
                if fd < 0 {
                    return Err(m.exit(64));
                }
                m.store_word(buffer, 0x0403_0201)?;
                if m.fwrite(fd, buffer, 1, 4)? != 1 {
                    return Err(m.exit(67));
                }
                if m.fclose(fd)? != 0 {
                    return Err(m.exit(65));
                }
                Ok(())
            }))
            .unwrap();
        registry
    }

    #[test]
    fn routine_mutates_memory_and_snapshot_reports_it() {
        let engine = HostEngine::new(registry(), ".");
        let mut program = program("negate_all", "negate_all.s");
        program.dump.registers.insert(Slot::A0);
        program.dump.regions.push(RegionDump::Symbol {
            label: "rvt_array_0".to_owned(),
            len: 3,
        });

        let result = engine.run(&program, &RunRequest::new()).unwrap();
        assert_eq!(result.termination, Termination::Exited(0));
        let snapshot = result.snapshot.expect("snapshot");
        assert_eq!(snapshot.register(Slot::A0), Some(-4));
        let base = snapshot.symbol("rvt_array_0").unwrap();
        assert_eq!(base, DATA_BASE);
        assert_eq!(snapshot.read_words(base, 3), Ok(vec![-4, 5, -6]));
        assert_eq!(result.stdout, "");
    }

    #[test]
    fn error_exit_has_no_snapshot() {
        let engine = HostEngine::new(registry(), ".");
        let mut program = program("negate_all", "negate_all.s");
        program.bindings[1] = (Slot::A1, SlotValue::Immediate(0));
        let result = engine.run(&program, &RunRequest::new()).unwrap();
        assert_eq!(result.exit_code(), Some(32));
        assert!(result.snapshot.is_none());
    }

    #[test]
    fn nested_call_requires_linked_source() {
        let engine = HostEngine::new(registry(), ".");
        let unlinked = program("twice", "twice.s");
        let report = engine.link_report(&unlinked).unwrap();
        assert_eq!(report.symbols(), vec!["negate_all".to_owned()]);
        let result = engine.run(&unlinked, &RunRequest::new()).unwrap();
        assert!(result.crashed());

        let mut linked = program("twice", "twice.s");
        linked.imports.push(PathBuf::from("negate_all.s"));
        assert!(engine.link_report(&linked).unwrap().is_clean());
        let result = engine.run(&linked, &RunRequest::new()).unwrap();
        assert_eq!(result.exit_code(), Some(0));
    }

    #[test]
    fn unknown_routine_is_an_engine_error() {
        let engine = HostEngine::new(registry(), ".");
        let err = engine
            .run(&program("missing", "missing.s"), &RunRequest::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownRoutine { .. }));
    }

    #[test]
    fn argv_matches_simulator_convention() {
        let mut registry = HostRegistry::new();
        registry
            .register(HostRoutine::new("echo_args", "echo_args.s", |m| {
                let argc = m.reg(Slot::A0);
                let argv = m.reg(Slot::A1) as u32;
                for index in 1..argc {
                    let pointer = m.load_word(argv + index as u32 * 4)? as u32;
                    m.print_str(pointer)?;
                    m.print_char('\n');
                }
                Ok(())
            }))
            .unwrap();
        let engine = HostEngine::new(registry, ".");
        let mut program = program("echo_args", "echo_args.s");
        program.bindings.clear();
        let result = engine
            .run(&program, &RunRequest::new().with_args(["first", "second.bin"]))
            .unwrap();
        assert_eq!(result.stdout, "first\nsecond.bin\n");
    }

    #[test]
    fn faults_fire_once_at_the_named_point() {
        let dir = tempdir().expect("tempdir should build");
        let engine = HostEngine::new(registry(), dir.path());
        let mut program = program("touch", "touch.s");
        program.data = vec![DataItem::Text {
            label: "rvt_path_0".to_owned(),
            offset: 0,
            text: "touched.bin".to_owned(),
        }];
        program.bindings = vec![(Slot::A0, SlotValue::Address("rvt_path_0".to_owned()))];

        for (fault, code) in [
            (FaultPoint::Malloc, 48),
            (FaultPoint::Fopen, 64),
            (FaultPoint::Fwrite, 67),
            (FaultPoint::Fclose, 65),
        ] {
            let result = engine
                .run(&program, &RunRequest::new().with_fault(fault))
                .unwrap();
            assert_eq!(result.exit_code(), Some(code), "fault {fault}");
        }

        let result = engine.run(&program, &RunRequest::new()).unwrap();
        assert_eq!(result.exit_code(), Some(0));
        let bytes = std::fs::read(dir.path().join("touched.bin")).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    fn crash_detail(routine: HostRoutine) -> String {
        let name = routine.name().to_owned();
        let source = routine.source().to_owned();
        let mut registry = HostRegistry::new();
        registry.register(routine).unwrap();
        let engine = HostEngine::new(registry, ".");
        let result = engine
            .run(&program(&name, &source), &RunRequest::new())
            .unwrap();
        match result.termination {
            Termination::Crashed(detail) => detail,
            other => panic!("expected crash, got {other:?}"),
        }
    }

    #[test]
    fn oversized_malloc_traps() {
        let detail = crash_detail(HostRoutine::new("hog", "hog.s", |m| {
            m.malloc(i32::MAX).map(|_| ())
        }));
        assert!(detail.contains("exceeds"), "{detail}");

        let detail = crash_detail(HostRoutine::new("creep", "creep.s", |m| {
            loop {
                m.malloc(MAX_ALLOCATION_BYTES as i32)?;
            }
        }));
        assert!(detail.contains("heap exhausted"), "{detail}");
    }

    #[test]
    fn fwrite_length_overflow_traps() {
        let detail = crash_detail(HostRoutine::new("spill", "spill.s", |m| {
            m.fwrite(3, DATA_BASE, 0x1_0000, 0x1_0000).map(|_| ())
        }));
        assert!(detail.contains("overflows"), "{detail}");
    }

    #[test]
    fn stack_exhaustion_traps() {
        let detail = crash_detail(HostRoutine::new("deep", "deep.s", |m| {
            m.stack_alloc(u32::MAX).map(|_| ())
        }));
        assert!(detail.contains("stack overflow"), "{detail}");
    }

    #[test]
    fn memory_faults_trap() {
        let mut registry = HostRegistry::new();
        registry
            .register(HostRoutine::new("wild", "wild.s", |m| {
                m.load_word(0x20).map(|_| ())
            }))
            .unwrap();
        let engine = HostEngine::new(registry, ".");
        let result = engine
            .run(&program("wild", "wild.s"), &RunRequest::new())
            .unwrap();
        match result.termination {
            Termination::Crashed(detail) => assert!(detail.contains("unmapped")),
            other => panic!("expected crash, got {other:?}"),
        }
        assert_eq!(HostExit::Exit(3).to_string(), "exit(3)");
    }
}
