//! The full scenario table against the reference routines on the host
//! engine. Every scenario must pass; a failure here is a harness bug.

use rvt_conformance::routines::reference_registry;
use rvt_conformance::{
    SuiteContext, emit_suite_json, emit_suite_markdown, fixtures, run_suite, scenarios,
};
use rvt_harness::{
    AssemblyTest, CheckStatus, HarnessConfig, HarnessError, RunRequest, Slot,
};
use rvt_matrix::read_matrix;
use rvt_runtime::HostEngine;
use rvt_test_utils::scenario_rng;
use std::path::Path;

fn host(dir: &Path) -> HostEngine {
    HostEngine::new(reference_registry().expect("unique routines"), dir)
}

#[test]
fn every_scenario_passes_on_reference_routines() {
    let dir = tempfile::tempdir().expect("tempdir should build");
    let engine = host(dir.path());
    let (_, seed) = scenario_rng();
    let mut ctx = SuiteContext::new(&engine, HarnessConfig::rooted_at(dir.path()), seed);

    let report = run_suite(&mut ctx, &scenarios::all(), 2);
    let failed = report
        .outcomes
        .iter()
        .filter(|outcome| !outcome.passed)
        .collect::<Vec<_>>();
    assert!(failed.is_empty(), "seed {seed}: {failed:#?}");
    assert!(report.total_scenarios > scenarios::all().len());
    assert!(emit_suite_markdown(&report).contains("| main::simple0 |"));
    assert!(emit_suite_json(&report).unwrap().contains("\"seed\""));
}

#[test]
fn fault_scenarios_skip_state_checks() {
    let dir = tempfile::tempdir().expect("tempdir should build");
    let engine = host(dir.path());
    let mut ctx = SuiteContext::new(&engine, HarnessConfig::rooted_at(dir.path()), 1);

    let report = run_suite(&mut ctx, &scenarios::matching("read_matrix::fread"), 1);
    let outcome = &report.outcomes[0];
    assert!(outcome.passed, "{outcome:#?}");
    assert_eq!(outcome.actual_exit, Some(66));
    assert_eq!(outcome.skipped.len(), 3);
}

#[test]
fn write_matrix_output_is_byte_exact() {
    let dir = tempfile::tempdir().expect("tempdir should build");
    let engine = host(dir.path());
    let mut ctx = SuiteContext::new(&engine, HarnessConfig::rooted_at(dir.path()), 1);

    let report = run_suite(&mut ctx, &scenarios::matching("write_matrix::simple"), 1);
    assert!(report.all_passed(), "{report:#?}");
    let written = std::fs::read(dir.path().join("outputs/write_matrix__simple/student.bin"))
        .expect("routine should write its output");
    assert_eq!(&written[..8], &[2, 0, 0, 0, 3, 0, 0, 0]);
    assert_eq!(written.len(), 8 + 6 * 4);
}

#[test]
fn main_prints_label_and_writes_scores() {
    let dir = tempfile::tempdir().expect("tempdir should build");
    let engine = host(dir.path());
    let config = HarnessConfig::rooted_at(dir.path());
    let fixture = fixtures::stage_simple_main(dir.path(), 0).unwrap();

    let mut t = AssemblyTest::new(&engine, config, "main::direct", "main.s");
    t.without_runtime().unwrap();
    t.call("main").unwrap();
    t.output_file(fixture.output()).unwrap();
    t.execute(RunRequest::new().with_args(fixture.args.clone()))
        .unwrap()
        .assert_passed();
    t.expect_stdout("2\n").unwrap();
    t.expect_file(fixture.output(), &fixture.reference).unwrap();
    let report = t.finish().unwrap();
    report.assert_passed();
    assert_eq!(report.outcomes.len(), 3);

    let scores = read_matrix(&dir.path().join(fixture.output())).unwrap();
    assert_eq!(scores.data, vec![1, 2, 3]);
}

#[test]
fn matmul_without_dot_is_rejected_before_running() {
    let dir = tempfile::tempdir().expect("tempdir should build");
    let engine = host(dir.path());
    let mut t = AssemblyTest::new(
        &engine,
        HarnessConfig::rooted_at(dir.path()),
        "matmul::unlinked",
        "matmul.s",
    );
    let m = t.array(&[1]).unwrap();
    let out = t.array(&[0]).unwrap();
    t.input_array(Slot::A0, &m).unwrap();
    t.input_scalar(Slot::A1, 1).unwrap();
    t.input_scalar(Slot::A2, 1).unwrap();
    t.input_array(Slot::A3, &m).unwrap();
    t.input_scalar(Slot::A4, 1).unwrap();
    t.input_scalar(Slot::A5, 1).unwrap();
    t.input_array(Slot::A6, &out).unwrap();
    t.call("matmul").unwrap();
    t.expect_array(&out, &[1]).unwrap();

    let err = t.execute(RunRequest::new()).unwrap_err();
    assert!(
        matches!(&err, HarnessError::UnresolvedSymbol { symbol, .. } if symbol == "dot"),
        "{err}"
    );
}

#[test]
fn wrong_expectation_fails_with_detail() {
    let dir = tempfile::tempdir().expect("tempdir should build");
    let engine = host(dir.path());
    let mut t = AssemblyTest::new(
        &engine,
        HarnessConfig::rooted_at(dir.path()),
        "abs::wrong",
        "abs.s",
    );
    t.input_scalar(Slot::A0, -5).unwrap();
    t.call("abs").unwrap();
    t.expect_scalar(Slot::A0, -5).unwrap();
    let report = t.execute(RunRequest::new()).unwrap();
    assert!(!report.passed());
    let failure = report.failures().next().expect("one failure");
    assert!(matches!(failure.status, CheckStatus::Failed(_)));
}
