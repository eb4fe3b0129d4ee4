//! read_matrix and write_matrix, including their fault paths.

use crate::fixtures::{self, READ_MATRIX_INPUT, WRITE_MATRIX_REFERENCE};
use crate::{Scenario, SuiteContext, SuiteError};
use rvt_core::{ExitCode, FaultPoint};
use rvt_harness::{RunRequest, Slot, VerificationReport};

pub const SCENARIOS: &[Scenario] = &[
    Scenario::fixed("read_matrix::simple", read_simple),
    Scenario::fixed("read_matrix::malloc_fault", read_malloc_fault),
    Scenario::fixed("read_matrix::fopen_fault", read_fopen_fault),
    Scenario::fixed("read_matrix::fread_fault", read_fread_fault),
    Scenario::fixed("read_matrix::fclose_fault", read_fclose_fault),
    Scenario::fixed("write_matrix::simple", write_simple),
    Scenario::fixed("write_matrix::fopen_fault", write_fopen_fault),
    Scenario::fixed("write_matrix::fwrite_fault", write_fwrite_fault),
    Scenario::fixed("write_matrix::fclose_fault", write_fclose_fault),
];

fn request(fault: Option<FaultPoint>) -> RunRequest {
    match fault {
        Some(point) => RunRequest::new().with_fault(point),
        None => RunRequest::new(),
    }
}

// ── read_matrix ────────────────────────────────────────────────────

fn read_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    fault: Option<FaultPoint>,
) -> Result<VerificationReport, SuiteError> {
    let expected = fixtures::stage_read_matrix(ctx.work_dir())?;

    let mut t = ctx.test(id, "read_matrix.s");
    t.input_read_filename(Slot::A0, &format!("{READ_MATRIX_INPUT}.bin"))?;
    let rows = t.array(&[-1])?;
    let cols = t.array(&[-1])?;
    t.input_array(Slot::A1, &rows)?;
    t.input_array(Slot::A2, &cols)?;
    t.call("read_matrix")?;

    t.expect_array(&rows, &[expected.rows as i32])?;
    t.expect_array(&cols, &[expected.cols as i32])?;
    t.expect_array_via_pointer(Slot::A0, &expected.data)?;
    if let Some(point) = fault {
        t.expect_exit_code(ExitCode::for_fault(point).code())?;
    }
    t.execute(request(fault))?;
    Ok(t.finish()?)
}

fn read_simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    read_case(ctx, "read_matrix::simple", None)
}

fn read_malloc_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    read_case(ctx, "read_matrix::malloc_fault", Some(FaultPoint::Malloc))
}

fn read_fopen_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    read_case(ctx, "read_matrix::fopen_fault", Some(FaultPoint::Fopen))
}

fn read_fread_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    read_case(ctx, "read_matrix::fread_fault", Some(FaultPoint::Fread))
}

fn read_fclose_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    read_case(ctx, "read_matrix::fclose_fault", Some(FaultPoint::Fclose))
}

// ── write_matrix ───────────────────────────────────────────────────

fn write_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    fault: Option<FaultPoint>,
) -> Result<VerificationReport, SuiteError> {
    fixtures::stage_write_matrix_reference(ctx.work_dir())?;
    let matrix = fixtures::write_matrix_input()?;
    let output = ctx.output_path(id, "student.bin");

    let mut t = ctx.test(id, "write_matrix.s");
    t.input_write_filename(Slot::A0, &output)?;
    let array = t.array(&matrix.data)?;
    t.input_array(Slot::A1, &array)?;
    t.input_scalar(Slot::A2, i64::from(matrix.rows))?;
    t.input_scalar(Slot::A3, i64::from(matrix.cols))?;
    t.call("write_matrix")?;
    t.expect_file(&output, WRITE_MATRIX_REFERENCE)?;
    if let Some(point) = fault {
        t.expect_exit_code(ExitCode::for_fault(point).code())?;
    }
    t.execute(request(fault))?;
    Ok(t.finish()?)
}

fn write_simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    write_case(ctx, "write_matrix::simple", None)
}

fn write_fopen_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    write_case(ctx, "write_matrix::fopen_fault", Some(FaultPoint::Fopen))
}

fn write_fwrite_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    write_case(ctx, "write_matrix::fwrite_fault", Some(FaultPoint::Fwrite))
}

fn write_fclose_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    write_case(ctx, "write_matrix::fclose_fault", Some(FaultPoint::Fclose))
}
