//! Scenario suites for the assembly routines, reference host routines, and
//! suite reports.
//!
//! Every scenario builds one `AssemblyTest`, stages whatever fixture files it
//! reads, runs it on the suite's engine and returns the verification report.
//! The same scenarios run under Venus against the real sources, or under the
//! host engine against `routines::reference_registry()`.

#![forbid(unsafe_code)]

pub mod fixtures;
pub mod oracles;
pub mod routines;
pub mod scenarios;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rvt_core::artifact_stem;
use rvt_harness::{AssemblyTest, CheckStatus, HarnessConfig, HarnessError, VerificationReport};
use rvt_matrix::MatrixError;
use rvt_runtime::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUITE_REPORT_SCHEMA_VERSION: &str = "rvtest.suite-report.v1";

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SuiteError {
    Harness(HarnessError),
    Matrix {
        path: String,
        source: MatrixError,
    },
    /// A fixture violates the scenario's own assumptions.
    Fixture(String),
}

impl std::fmt::Display for SuiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Harness(err) => write!(f, "{err}"),
            Self::Matrix { path, source } => write!(f, "fixture {path}: {source}"),
            Self::Fixture(detail) => write!(f, "fixture: {detail}"),
        }
    }
}

impl std::error::Error for SuiteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Harness(err) => Some(err),
            Self::Matrix { source, .. } => Some(source),
            Self::Fixture(_) => None,
        }
    }
}

impl From<HarnessError> for SuiteError {
    fn from(err: HarnessError) -> Self {
        Self::Harness(err)
    }
}

// ── Scenario context ───────────────────────────────────────────────

/// Shared state for one suite run: the engine, the harness layout and the
/// seeded generator random scenarios draw from.
pub struct SuiteContext<'e> {
    engine: &'e dyn Engine,
    config: HarnessConfig,
    seed: u64,
    rng: StdRng,
}

impl<'e> SuiteContext<'e> {
    #[must_use]
    pub fn new(engine: &'e dyn Engine, config: HarnessConfig, seed: u64) -> Self {
        Self {
            engine,
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &'e dyn Engine {
        self.engine
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    /// A fresh test on the suite's engine and layout.
    #[must_use]
    pub fn test(&self, test_id: &str, source: &str) -> AssemblyTest<'e> {
        AssemblyTest::new(self.engine, self.config.clone(), test_id, source)
    }

    /// Per-test output path relative to the work dir.
    #[must_use]
    pub fn output_path(&self, test_id: &str, file: &str) -> String {
        format!("outputs/{}/{file}", artifact_stem(test_id))
    }
}

pub type ScenarioFn = fn(&mut SuiteContext<'_>) -> Result<VerificationReport, SuiteError>;

#[derive(Clone, Copy)]
pub struct Scenario {
    pub id: &'static str,
    /// Draws fresh inputs on every run; repeated under `--repeat`.
    pub randomized: bool,
    pub run: ScenarioFn,
}

impl Scenario {
    #[must_use]
    pub const fn fixed(id: &'static str, run: ScenarioFn) -> Self {
        Self {
            id,
            randomized: false,
            run,
        }
    }

    #[must_use]
    pub const fn randomized(id: &'static str, run: ScenarioFn) -> Self {
        Self {
            id,
            randomized: true,
            run,
        }
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("randomized", &self.randomized)
            .finish()
    }
}

// ── Reports ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_id: String,
    pub passed: bool,
    pub expected_exit: Option<i32>,
    pub actual_exit: Option<i32>,
    pub failures: Vec<String>,
    pub skipped: Vec<String>,
    /// Harness or fixture error that stopped the scenario.
    pub error: Option<String>,
}

impl ScenarioOutcome {
    fn from_report(scenario_id: &str, report: &VerificationReport) -> Self {
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        for outcome in &report.outcomes {
            match &outcome.status {
                CheckStatus::Passed => {}
                CheckStatus::Failed(failure) => {
                    failures.push(format!("{}: {failure}", outcome.description));
                }
                CheckStatus::Skipped(reason) => {
                    skipped.push(format!("{}: {reason}", outcome.description));
                }
            }
        }
        Self {
            scenario_id: scenario_id.to_owned(),
            passed: report.passed(),
            expected_exit: Some(report.expected_exit),
            actual_exit: report.actual_exit,
            failures,
            skipped,
            error: None,
        }
    }

    fn from_error(scenario_id: &str, err: &SuiteError) -> Self {
        Self {
            scenario_id: scenario_id.to_owned(),
            passed: false,
            expected_exit: None,
            actual_exit: None,
            failures: Vec::new(),
            skipped: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub schema_version: String,
    pub engine: String,
    pub seed: u64,
    pub total_scenarios: usize,
    pub passed_scenarios: usize,
    pub failed_scenarios: usize,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_scenarios == 0
    }
}

/// Runs each scenario once, randomized ones `repeat` times.
pub fn run_suite(ctx: &mut SuiteContext<'_>, scenarios: &[Scenario], repeat: usize) -> SuiteReport {
    let mut outcomes = Vec::new();
    for scenario in scenarios {
        let runs = if scenario.randomized { repeat.max(1) } else { 1 };
        for run in 0..runs {
            let id = if runs > 1 {
                format!("{}#{run}", scenario.id)
            } else {
                scenario.id.to_owned()
            };
            let outcome = match (scenario.run)(ctx) {
                Ok(report) => ScenarioOutcome::from_report(&id, &report),
                Err(err) => ScenarioOutcome::from_error(&id, &err),
            };
            if outcome.passed {
                log::debug!("{id}: passed");
            } else {
                log::warn!("{id}: failed");
            }
            outcomes.push(outcome);
        }
    }

    let passed = outcomes.iter().filter(|outcome| outcome.passed).count();
    SuiteReport {
        schema_version: SUITE_REPORT_SCHEMA_VERSION.to_owned(),
        engine: format!("{} {}", ctx.engine.name(), ctx.engine.version()),
        seed: ctx.seed,
        total_scenarios: outcomes.len(),
        passed_scenarios: passed,
        failed_scenarios: outcomes.len() - passed,
        outcomes,
    }
}

pub fn emit_suite_json(report: &SuiteReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[must_use]
pub fn emit_suite_markdown(report: &SuiteReport) -> String {
    let mut out = String::new();
    out.push_str("# Assembly Suite Report\n\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|---|---|\n");
    out.push_str(&format!("| Schema | `{}` |\n", report.schema_version));
    out.push_str(&format!("| Engine | `{}` |\n", report.engine));
    out.push_str(&format!("| Seed | {} |\n", report.seed));
    out.push_str(&format!("| Total Scenarios | {} |\n", report.total_scenarios));
    out.push_str(&format!("| Passed | {} |\n", report.passed_scenarios));
    out.push_str(&format!("| Failed | {} |\n\n", report.failed_scenarios));

    out.push_str("| Scenario | Expected Exit | Actual Exit | Passed | Detail |\n");
    out.push_str("|---|---|---|---|---|\n");
    for outcome in &report.outcomes {
        let detail = match &outcome.error {
            Some(err) => err.clone(),
            None => outcome.failures.join("; "),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            outcome.scenario_id,
            exit_cell(outcome.expected_exit),
            exit_cell(outcome.actual_exit),
            outcome.passed,
            detail.replace('|', "\\|").replace('\n', " ")
        ));
    }

    out
}

fn exit_cell(code: Option<i32>) -> String {
    code.map_or_else(|| "-".to_owned(), |code| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::{ScenarioOutcome, SuiteReport, emit_suite_json, emit_suite_markdown};

    fn report() -> SuiteReport {
        SuiteReport {
            schema_version: super::SUITE_REPORT_SCHEMA_VERSION.to_owned(),
            engine: "host test".to_owned(),
            seed: 7,
            total_scenarios: 2,
            passed_scenarios: 1,
            failed_scenarios: 1,
            outcomes: vec![
                ScenarioOutcome {
                    scenario_id: "abs::zero".to_owned(),
                    passed: true,
                    expected_exit: Some(0),
                    actual_exit: Some(0),
                    failures: Vec::new(),
                    skipped: Vec::new(),
                    error: None,
                },
                ScenarioOutcome {
                    scenario_id: "dot::length".to_owned(),
                    passed: false,
                    expected_exit: Some(32),
                    actual_exit: None,
                    failures: Vec::new(),
                    skipped: Vec::new(),
                    error: Some("engine crashed | bad".to_owned()),
                },
            ],
        }
    }

    #[test]
    fn markdown_lists_every_scenario() {
        let markdown = emit_suite_markdown(&report());
        assert!(markdown.starts_with("# Assembly Suite Report"));
        assert!(markdown.contains("| abs::zero | 0 | 0 | true |  |"));
        assert!(markdown.contains("| dot::length | 32 | - | false | engine crashed \\| bad |"));
    }

    #[test]
    fn json_round_trips() {
        let json = emit_suite_json(&report()).unwrap();
        let parsed: SuiteReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report());
        assert!(!parsed.all_passed());
    }
}
