use crate::{Scenario, SuiteContext, SuiteError, oracles};
use rand::Rng;
use rvt_harness::{RunRequest, Slot, VerificationReport};
use rvt_matrix::randmat;

pub const SCENARIOS: &[Scenario] = &[
    Scenario::fixed("matmul::simple", simple),
    Scenario::randomized("matmul::random", random),
    Scenario::fixed("matmul::inner_mismatch", inner_mismatch),
    Scenario::fixed("matmul::zero_rows", zero_rows),
];

/// Runs `m0 * m1` into a zeroed output array of `out_len` words. The
/// expected product (or exit code) comes from the oracle.
fn matmul_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    (m0, rows0, cols0): (&[i32], i32, i32),
    (m1, rows1, cols1): (&[i32], i32, i32),
    out_len: usize,
) -> Result<VerificationReport, SuiteError> {
    let mut t = ctx.test(id, "matmul.s");
    t.include("dot.s")?;
    let left = t.array(m0)?;
    let right = t.array(m1)?;
    let out = t.array(&vec![0; out_len])?;

    t.input_array(Slot::A0, &left)?;
    t.input_scalar(Slot::A1, i64::from(rows0))?;
    t.input_scalar(Slot::A2, i64::from(cols0))?;
    t.input_array(Slot::A3, &right)?;
    t.input_scalar(Slot::A4, i64::from(rows1))?;
    t.input_scalar(Slot::A5, i64::from(cols1))?;
    t.input_array(Slot::A6, &out)?;
    t.call("matmul")?;

    match oracles::matmul(m0, (rows0, cols0), m1, (rows1, cols1)) {
        Ok(expected) => t.expect_array(&out, &expected)?,
        Err(code) => t.expect_exit_code(code.code())?,
    }
    t.execute(RunRequest::new())?;
    Ok(t.finish()?)
}

fn simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let m = [1, 2, 3, 4, 5, 6, 7, 8, 9];
    matmul_case(ctx, "matmul::simple", (&m, 3, 3), (&m, 3, 3), 9)
}

fn random(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let rng = ctx.rng();
    let (n, m, k) = (
        rng.gen_range(3..=20),
        rng.gen_range(3..=20),
        rng.gen_range(3..=20),
    );
    let left = randmat(rng, n, k);
    let right = randmat(rng, k, m);
    matmul_case(
        ctx,
        "matmul::random",
        (&left.data, n as i32, k as i32),
        (&right.data, k as i32, m as i32),
        (n * m) as usize,
    )
}

fn inner_mismatch(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    matmul_case(
        ctx,
        "matmul::inner_mismatch",
        (&[5, 6, 3], 1, 3),
        (&[3, 9, 0], 4, 1),
        1,
    )
}

fn zero_rows(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    matmul_case(ctx, "matmul::zero_rows", (&[1], 0, 4), (&[2], 4, 5), 1)
}
