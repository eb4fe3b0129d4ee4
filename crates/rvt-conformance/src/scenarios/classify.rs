//! classify with its full dependency list, and main.s end to end.

use crate::fixtures::{self, MainFixture};
use crate::{Scenario, SuiteContext, SuiteError};
use rvt_core::{ExitCode, FaultPoint};
use rvt_harness::{AssemblyTest, RunRequest, VerificationReport};

pub const SCENARIOS: &[Scenario] = &[
    Scenario::fixed("classify::simple0", classify_simple),
    Scenario::fixed("classify::malloc_fault", classify_malloc_fault),
    Scenario::fixed("classify::extra_argument", classify_extra_argument),
    Scenario::fixed("main::simple0", main_simple0),
    Scenario::fixed("main::simple1", main_simple1),
    Scenario::randomized("main::custom0", main_custom0),
    Scenario::randomized("main::custom1", main_custom1),
    Scenario::randomized("main::custom2", main_custom2),
];

const CLASSIFY_DEPENDENCIES: &[&str] = &[
    "argmax.s",
    "dot.s",
    "matmul.s",
    "read_matrix.s",
    "relu.s",
    "write_matrix.s",
];

fn classify_test<'e>(ctx: &SuiteContext<'e>, id: &str) -> Result<AssemblyTest<'e>, SuiteError> {
    let mut t = ctx.test(id, "classify.s");
    for dependency in CLASSIFY_DEPENDENCIES {
        t.include(dependency)?;
    }
    t.call("classify")?;
    Ok(t)
}

fn classify_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    fault: Option<FaultPoint>,
    extra_arg: bool,
) -> Result<VerificationReport, SuiteError> {
    let fixture = fixtures::stage_simple_main(ctx.work_dir(), 0)?;
    let output = ctx.output_path(id, "student.bin");
    let mut args = fixture.with_output(output.clone());
    if extra_arg {
        args.push("loremipsum".to_owned());
    }

    let mut t = classify_test(ctx, id)?;
    t.output_file(&output)?;
    t.expect_file(&output, &fixture.reference)?;
    t.expect_stdout(&fixture.expected_stdout())?;
    let mut request = RunRequest::new().with_args(args);
    if let Some(point) = fault {
        t.expect_exit_code(ExitCode::for_fault(point).code())?;
        request = request.with_fault(point);
    }
    if extra_arg {
        t.expect_exit_code(ExitCode::ArgumentCount.code())?;
    }
    t.execute(request)?;
    Ok(t.finish()?)
}

fn classify_simple(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    classify_case(ctx, "classify::simple0", None, false)
}

fn classify_malloc_fault(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    classify_case(ctx, "classify::malloc_fault", Some(FaultPoint::Malloc), false)
}

fn classify_extra_argument(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    classify_case(ctx, "classify::extra_argument", None, true)
}

// ── main ───────────────────────────────────────────────────────────

/// main.s imports its own runtime and dependencies, so only its outputs are
/// checked.
fn main_case(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    fixture: &MainFixture,
) -> Result<VerificationReport, SuiteError> {
    let mut t = ctx.test(id, "main.s");
    t.without_runtime()?;
    t.call("main")?;
    t.output_file(fixture.output())?;
    t.expect_stdout(&fixture.expected_stdout())?;
    t.expect_file(fixture.output(), &fixture.reference)?;
    t.execute(RunRequest::new().with_args(fixture.args.clone()))?;
    Ok(t.finish()?)
}

fn main_simple(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    index: usize,
) -> Result<VerificationReport, SuiteError> {
    let fixture = fixtures::stage_simple_main(ctx.work_dir(), index)?;
    main_case(ctx, id, &fixture)
}

fn main_custom(
    ctx: &mut SuiteContext<'_>,
    id: &str,
    index: usize,
) -> Result<VerificationReport, SuiteError> {
    let work_dir = ctx.work_dir().to_path_buf();
    let fixture = fixtures::stage_random_main(&work_dir, index, ctx.rng())?;
    main_case(ctx, id, &fixture)
}

fn main_simple0(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    main_simple(ctx, "main::simple0", 0)
}

fn main_simple1(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    main_simple(ctx, "main::simple1", 1)
}

fn main_custom0(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    main_custom(ctx, "main::custom0", 0)
}

fn main_custom1(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    main_custom(ctx, "main::custom1", 1)
}

fn main_custom2(ctx: &mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError> {
    main_custom(ctx, "main::custom2", 2)
}
