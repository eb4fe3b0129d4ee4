//! Reference routines for the host engine.
//!
//! Each routine follows the calling convention of its assembly counterpart:
//! arguments in a0..a6, result in a0, error paths through `exit` with the
//! codes in `rvt_core::ExitCode`. Nested routines are reached through
//! `HostMachine::call`, so the link checks apply to them as they would to
//! `jal`.

use crate::oracles;
use rvt_core::{ExitCode, Slot, WORD_BYTES};
use rvt_runtime::{EngineError, HostExit, HostMachine, HostRegistry, HostRoutine};

const READ_MODE: i32 = 0;
const WRITE_MODE: i32 = 1;

/// Sources `main.s` pulls in through its own imports.
pub const MAIN_LINKS: &[&str] = &[
    "classify.s",
    "argmax.s",
    "dot.s",
    "matmul.s",
    "read_matrix.s",
    "relu.s",
    "write_matrix.s",
    "utils.s",
];

fn fail(m: &HostMachine<'_>, code: ExitCode) -> HostExit {
    m.exit(code.code())
}

fn addr(m: &HostMachine<'_>, slot: Slot) -> u32 {
    m.reg(slot) as u32
}

fn abs(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let value = m.reg(Slot::A0);
    m.set_reg(Slot::A0, oracles::abs(value));
    Ok(())
}

fn relu(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let len = m.reg(Slot::A1);
    if len < 1 {
        return Err(fail(m, ExitCode::InvalidLength));
    }
    let base = addr(m, Slot::A0);
    let values = m.load_words(base, len as usize)?;
    let clamped = oracles::relu(&values).map_err(|code| fail(m, code))?;
    m.store_words(base, &clamped)
}

fn argmax(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let len = m.reg(Slot::A1);
    if len < 1 {
        return Err(fail(m, ExitCode::InvalidLength));
    }
    let values = m.load_words(addr(m, Slot::A0), len as usize)?;
    let index = oracles::argmax(&values).map_err(|code| fail(m, code))?;
    m.set_reg(Slot::A0, index as i32);
    Ok(())
}

fn dot(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let (len, stride0, stride1) = (m.reg(Slot::A2), m.reg(Slot::A3), m.reg(Slot::A4));
    if len < 1 {
        return Err(fail(m, ExitCode::InvalidLength));
    }
    if stride0 < 1 || stride1 < 1 {
        return Err(fail(m, ExitCode::InvalidStride));
    }
    // Only the strided elements are touched, as the routine would.
    let mut acc = 0i32;
    for index in 0..len as u32 {
        let left = m.load_word(addr(m, Slot::A0) + index * stride0 as u32 * WORD_BYTES)?;
        let right = m.load_word(addr(m, Slot::A1) + index * stride1 as u32 * WORD_BYTES)?;
        acc = acc.wrapping_add(left.wrapping_mul(right));
    }
    m.set_reg(Slot::A0, acc);
    Ok(())
}

fn matmul(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let m0 = addr(m, Slot::A0);
    let (rows0, cols0) = (m.reg(Slot::A1), m.reg(Slot::A2));
    let m1 = addr(m, Slot::A3);
    let (rows1, cols1) = (m.reg(Slot::A4), m.reg(Slot::A5));
    let out = addr(m, Slot::A6);
    if rows0 < 1 || cols0 < 1 || rows1 < 1 || cols1 < 1 || cols0 != rows1 {
        return Err(fail(m, ExitCode::DimensionMismatch));
    }

    for row in 0..rows0 as u32 {
        for col in 0..cols1 as u32 {
            m.set_reg(Slot::A0, (m0 + row * cols0 as u32 * WORD_BYTES) as i32);
            m.set_reg(Slot::A1, (m1 + col * WORD_BYTES) as i32);
            m.set_reg(Slot::A2, cols0);
            m.set_reg(Slot::A3, 1);
            m.set_reg(Slot::A4, cols1);
            m.call("dot")?;
            let cell = out + (row * cols1 as u32 + col) * WORD_BYTES;
            m.store_word(cell, m.reg(Slot::A0))?;
        }
    }
    Ok(())
}

/// a0 = filename, a1/a2 = where to store rows/cols. Returns the matrix in
/// freshly allocated memory.
fn read_matrix(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let (rows_at, cols_at) = (addr(m, Slot::A1), addr(m, Slot::A2));
    let fd = m.fopen(addr(m, Slot::A0), READ_MODE)?;
    if fd < 0 {
        return Err(fail(m, ExitCode::FopenFailure));
    }
    if m.fread(fd, rows_at, WORD_BYTES as i32)? != WORD_BYTES as i32
        || m.fread(fd, cols_at, WORD_BYTES as i32)? != WORD_BYTES as i32
    {
        return Err(fail(m, ExitCode::FreadFailure));
    }
    let (rows, cols) = (m.load_word(rows_at)?, m.load_word(cols_at)?);
    let bytes = rows.wrapping_mul(cols).wrapping_mul(WORD_BYTES as i32);
    let buffer = m.malloc(bytes.max(0))?;
    if buffer == 0 {
        return Err(fail(m, ExitCode::MallocFailure));
    }
    if m.fread(fd, buffer, bytes)? != bytes {
        return Err(fail(m, ExitCode::FreadFailure));
    }
    if m.fclose(fd)? != 0 {
        return Err(fail(m, ExitCode::FcloseFailure));
    }
    m.set_reg(Slot::A0, buffer as i32);
    Ok(())
}

/// a0 = filename, a1 = matrix, a2 = rows, a3 = cols.
fn write_matrix(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    let matrix = addr(m, Slot::A1);
    let (rows, cols) = (m.reg(Slot::A2), m.reg(Slot::A3));
    let fd = m.fopen(addr(m, Slot::A0), WRITE_MODE)?;
    if fd < 0 {
        return Err(fail(m, ExitCode::FopenFailure));
    }
    let header = m.stack_alloc(2 * WORD_BYTES)?;
    m.store_words(header, &[rows, cols])?;
    if m.fwrite(fd, header, 2, WORD_BYTES as i32)? != 2 {
        return Err(fail(m, ExitCode::FwriteFailure));
    }
    let items = rows.wrapping_mul(cols);
    if m.fwrite(fd, matrix, items, WORD_BYTES as i32)? != items {
        return Err(fail(m, ExitCode::FwriteFailure));
    }
    if m.fclose(fd)? != 0 {
        return Err(fail(m, ExitCode::FcloseFailure));
    }
    Ok(())
}

/// a0 = argc, a1 = argv, a2 = 0 to print the label. argv holds the program,
/// m0, m1, input and output paths.
fn classify(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    if m.reg(Slot::A0) != 5 {
        return Err(fail(m, ExitCode::ArgumentCount));
    }
    let argv = addr(m, Slot::A1);
    let print = m.reg(Slot::A2) == 0;

    let dims = m.malloc(6 * WORD_BYTES as i32)?;
    if dims == 0 {
        return Err(fail(m, ExitCode::MallocFailure));
    }
    let mut loaded = [(0u32, 0i32, 0i32); 3];
    for (index, entry) in loaded.iter_mut().enumerate() {
        let dim_at = dims + index as u32 * 2 * WORD_BYTES;
        let path = m.load_word(argv + (index as u32 + 1) * WORD_BYTES)?;
        m.set_reg(Slot::A0, path);
        m.set_reg(Slot::A1, dim_at as i32);
        m.set_reg(Slot::A2, (dim_at + WORD_BYTES) as i32);
        m.call("read_matrix")?;
        let rows = m.load_word(dim_at)?;
        let cols = m.load_word(dim_at + WORD_BYTES)?;
        *entry = (addr(m, Slot::A0), rows, cols);
    }
    let [(m0, rows0, cols0), (m1, rows1, cols1), (input, rows_in, cols_in)] = loaded;

    let hidden = multiply(m, (m0, rows0, cols0), (input, rows_in, cols_in))?;
    m.set_reg(Slot::A0, hidden as i32);
    m.set_reg(Slot::A1, rows0.wrapping_mul(cols_in));
    m.call("relu")?;
    let scores = multiply(m, (m1, rows1, cols1), (hidden, rows0, cols_in))?;

    let output = m.load_word(argv + 4 * WORD_BYTES)?;
    m.set_reg(Slot::A0, output);
    m.set_reg(Slot::A1, scores as i32);
    m.set_reg(Slot::A2, rows1);
    m.set_reg(Slot::A3, cols_in);
    m.call("write_matrix")?;

    m.set_reg(Slot::A0, scores as i32);
    m.set_reg(Slot::A1, rows1.wrapping_mul(cols_in));
    m.call("argmax")?;
    let label = m.reg(Slot::A0);
    if print {
        m.print_int(label);
        m.print_char('\n');
    }
    m.set_reg(Slot::A0, label);
    Ok(())
}

fn multiply(
    m: &mut HostMachine<'_>,
    (left, rows0, cols0): (u32, i32, i32),
    (right, rows1, cols1): (u32, i32, i32),
) -> Result<u32, HostExit> {
    let out = m.malloc(rows0.wrapping_mul(cols1).wrapping_mul(WORD_BYTES as i32).max(0))?;
    if out == 0 {
        return Err(fail(m, ExitCode::MallocFailure));
    }
    m.set_reg(Slot::A0, left as i32);
    m.set_reg(Slot::A1, rows0);
    m.set_reg(Slot::A2, cols0);
    m.set_reg(Slot::A3, right as i32);
    m.set_reg(Slot::A4, rows1);
    m.set_reg(Slot::A5, cols1);
    m.set_reg(Slot::A6, out as i32);
    m.call("matmul")?;
    Ok(out)
}

fn run_main(m: &mut HostMachine<'_>) -> Result<(), HostExit> {
    m.set_reg(Slot::A2, 0);
    m.call("classify")
}

/// Host routines for every source the suites test.
pub fn reference_registry() -> Result<HostRegistry, EngineError> {
    let mut registry = HostRegistry::new();
    for routine in [
        HostRoutine::new("abs", "abs.s", abs),
        HostRoutine::new("relu", "relu.s", relu),
        HostRoutine::new("argmax", "argmax.s", argmax),
        HostRoutine::new("dot", "dot.s", dot),
        HostRoutine::new("matmul", "matmul.s", matmul).calls(&["dot"]),
        HostRoutine::new("read_matrix", "read_matrix.s", read_matrix),
        HostRoutine::new("write_matrix", "write_matrix.s", write_matrix),
        HostRoutine::new("classify", "classify.s", classify).calls(&[
            "read_matrix",
            "matmul",
            "relu",
            "write_matrix",
            "argmax",
        ]),
        HostRoutine::new("main", "main.s", run_main)
            .calls(&["classify"])
            .links(MAIN_LINKS),
    ] {
        registry.register(routine)?;
    }
    Ok(registry)
}
