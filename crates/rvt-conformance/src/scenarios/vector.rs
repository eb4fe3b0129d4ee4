//! abs, relu, argmax and dot.

use crate::{Scenario, SuiteContext, SuiteError, oracles};
use rand::Rng;
use rvt_harness::{RunRequest, Slot, VerificationReport};

pub const SCENARIOS: &[Scenario] = &[
    Scenario::fixed("abs::zero", abs_zero),
    Scenario::fixed("abs::one", abs_one),
    Scenario::fixed("abs::minus_one", abs_minus_one),
    Scenario::fixed("abs::negative_large", abs_negative_large),
    Scenario::fixed("abs::positive_large", abs_positive_large),
    Scenario::fixed("relu::simple", relu_simple),
    Scenario::randomized("relu::random", relu_random),
    Scenario::randomized("relu::zero_length", relu_zero_length),
    Scenario::fixed("argmax::simple", argmax_simple),
    Scenario::randomized("argmax::random", argmax_random),
    Scenario::fixed("argmax::zero_length", argmax_zero_length),
    Scenario::randomized("dot::simple", dot_simple),
    Scenario::randomized("dot::stride", dot_stride),
    Scenario::randomized("dot::zero_length", dot_zero_length),
    Scenario::randomized("dot::zero_stride", dot_zero_stride),
];

// ── abs ────────────────────────────────────────────────────────────

fn abs_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    input: i32,
) -> Result<VerificationReport, SuiteError> {
    let mut t = ctx.test(id, "abs.s");
    t.input_scalar(Slot::A0, i64::from(input))?;
    t.call("abs")?;
    t.expect_scalar(Slot::A0, i64::from(oracles::abs(input)))?;
    t.execute(RunRequest::new())?;
    Ok(t.finish()?)
}

fn abs_zero(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    abs_case(ctx, "abs::zero", 0)
}

fn abs_one(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    abs_case(ctx, "abs::one", 1)
}

fn abs_minus_one(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    abs_case(ctx, "abs::minus_one", -1)
}

fn abs_negative_large(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    abs_case(ctx, "abs::negative_large", -114_514)
}

fn abs_positive_large(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    abs_case(ctx, "abs::positive_large", 1_919_810)
}

// ── relu ───────────────────────────────────────────────────────────

fn random_words(ctx: &mut SuiteContext<'_>, len: std::ops::RangeInclusive<usize>) -> Vec<i32> {
    let rng = ctx.rng();
    let len = rng.gen_range(len);
    (0..len).map(|_| rng.r#gen::<i32>()).collect()
}

fn relu_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    values: &[i32],
    len: i64,
) -> Result<VerificationReport, SuiteError> {
    let mut t = ctx.test(id, "relu.s");
    let array = t.array(values)?;
    t.input_array(Slot::A0, &array)?;
    t.input_scalar(Slot::A1, len)?;
    t.call("relu")?;
    match oracles::relu(&values[..len.max(0) as usize]) {
        Ok(expected) => t.expect_array(&array, &expected)?,
        Err(code) => t.expect_exit_code(code.code())?,
    }
    t.execute(RunRequest::new())?;
    Ok(t.finish()?)
}

fn relu_simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let values = [1, -2, 3, -4, 5, -6, 7, -8, 9];
    relu_case(ctx, "relu::simple", &values, values.len() as i64)
}

fn relu_random(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let values = random_words(ctx, 10..=20);
    relu_case(ctx, "relu::random", &values, values.len() as i64)
}

fn relu_zero_length(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let values = random_words(ctx, 10..=20);
    relu_case(ctx, "relu::zero_length", &values, 0)
}

// ── argmax ─────────────────────────────────────────────────────────

fn argmax_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    values: &[i32],
    len: i64,
) -> Result<VerificationReport, SuiteError> {
    let mut t = ctx.test(id, "argmax.s");
    let array = t.array(values)?;
    t.input_array(Slot::A0, &array)?;
    t.input_scalar(Slot::A1, len)?;
    t.call("argmax")?;
    match oracles::argmax(&values[..len.max(0) as usize]) {
        Ok(index) => t.expect_scalar(Slot::A0, index as i64)?,
        Err(code) => t.expect_exit_code(code.code())?,
    }
    t.execute(RunRequest::new())?;
    Ok(t.finish()?)
}

fn argmax_simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    argmax_case(ctx, "argmax::simple", &[1, 1, 4, 5, 1, 4], 6)
}

fn argmax_random(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let rng = ctx.rng();
    let len = rng.gen_range(20..=100);
    let values = (0..len).map(|_| rng.gen_range(-5..=5)).collect::<Vec<i32>>();
    argmax_case(ctx, "argmax::random", &values, values.len() as i64)
}

fn argmax_zero_length(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    argmax_case(ctx, "argmax::zero_length", &[1, 1, 4, 5, 1, 4], 0)
}

// ── dot ────────────────────────────────────────────────────────────

/// Vectors are padded past the last strided element like the classic
/// fixtures, so an off-by-one read still lands on real data.
fn dot_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    len: i32,
    stride0: i32,
    stride1: i32,
) -> Result<VerificationReport, SuiteError> {
    let rng = ctx.rng();
    let v0 = (0..len.max(0) * stride0.max(0) + 10)
        .map(|_| rng.gen_range(1..=100))
        .collect::<Vec<i32>>();
    let v1 = (0..len.max(0) * stride1.max(0) + 10)
        .map(|_| rng.gen_range(1..=100))
        .collect::<Vec<i32>>();

    let mut t = ctx.test(id, "dot.s");
    let left = t.array(&v0)?;
    let right = t.array(&v1)?;
    t.input_array(Slot::A0, &left)?;
    t.input_array(Slot::A1, &right)?;
    t.input_scalar(Slot::A2, i64::from(len))?;
    t.input_scalar(Slot::A3, i64::from(stride0))?;
    t.input_scalar(Slot::A4, i64::from(stride1))?;
    t.call("dot")?;
    match oracles::dot(&v0, &v1, len, stride0, stride1) {
        Ok(expected) => t.expect_scalar(Slot::A0, i64::from(expected))?,
        Err(code) => t.expect_exit_code(code.code())?,
    }
    t.execute(RunRequest::new())?;
    Ok(t.finish()?)
}

fn dot_simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    dot_case(ctx, "dot::simple", 30, 1, 1)
}

fn dot_stride(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    let rng = ctx.rng();
    let (len, stride0, stride1) = (
        rng.gen_range(5..=60),
        rng.gen_range(1..=5),
        rng.gen_range(1..=5),
    );
    dot_case(ctx, "dot::stride", len, stride0, stride1)
}

fn dot_zero_length(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    dot_case(ctx, "dot::zero_length", 0, 1, 1)
}

fn dot_zero_stride(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    dot_case(ctx, "dot::zero_stride", 30, 1, 0)
}
