#![forbid(unsafe_code)]

use rvt_backend_venus::{VenusConfig, VenusEngine};
use rvt_conformance::routines::reference_registry;
use rvt_conformance::{SuiteContext, emit_suite_json, emit_suite_markdown, run_suite, scenarios};
use rvt_harness::HarnessConfig;
use rvt_runtime::{Engine, HostEngine};
use rvt_test_utils::capture_seed;
use std::path::PathBuf;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    }
}

fn usage() -> String {
    "usage: rvt_suite [--host] [--filter PREFIX] [--repeat N] [--seed N] \
     [--root DIR] [--json PATH] [--markdown PATH]"
        .to_owned()
}

/// Returns whether every scenario passed.
fn run() -> Result<bool, String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", usage());
        return Ok(true);
    }

    let use_host = args.iter().any(|arg| arg == "--host");
    let filter = optional_flag(&args, "--filter")?;
    let repeat = optional_usize_flag(&args, "--repeat")?.unwrap_or(1);
    let seed = match optional_flag(&args, "--seed")? {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|err| format!("invalid --seed `{raw}`: {err}"))?,
        None => capture_seed().unwrap_or_else(rand::random),
    };
    let config = match optional_flag(&args, "--root")? {
        Some(root) => HarnessConfig::rooted_at(&PathBuf::from(root)).with_env_overrides(),
        None => HarnessConfig::default_paths(),
    };

    let engine: Box<dyn Engine> = if use_host {
        let registry = reference_registry().map_err(|err| err.to_string())?;
        Box::new(HostEngine::new(registry, config.work_dir.clone()))
    } else {
        let venus = VenusConfig::from_env(&config.assembly_dir, &config.work_dir)
            .map_err(|err| err.to_string())?;
        Box::new(VenusEngine::new(venus).map_err(|err| err.to_string())?)
    };

    let selected = match &filter {
        Some(prefix) => scenarios::matching(prefix),
        None => scenarios::all(),
    };
    if selected.is_empty() {
        return Err(format!("no scenario matches `{}`", filter.unwrap_or_default()));
    }

    let mut ctx = SuiteContext::new(engine.as_ref(), config, seed);
    let report = run_suite(&mut ctx, &selected, repeat);

    if let Some(path) = optional_flag(&args, "--json")? {
        let json = emit_suite_json(&report).map_err(|err| err.to_string())?;
        std::fs::write(&path, json).map_err(|err| format!("write {path}: {err}"))?;
    }
    let markdown = emit_suite_markdown(&report);
    match optional_flag(&args, "--markdown")? {
        Some(path) => {
            std::fs::write(&path, &markdown).map_err(|err| format!("write {path}: {err}"))?;
        }
        None => print!("{markdown}"),
    }

    eprintln!(
        "{}/{} scenarios passed (engine {}, seed {})",
        report.passed_scenarios, report.total_scenarios, report.engine, report.seed
    );
    Ok(report.all_passed())
}

fn optional_flag(args: &[String], flag: &str) -> Result<Option<String>, String> {
    let Some(index) = args.iter().position(|arg| arg == flag) else {
        return Ok(None);
    };
    args.get(index + 1)
        .filter(|value| !value.starts_with("--"))
        .cloned()
        .map(Some)
        .ok_or_else(|| format!("{flag} requires a value\n{}", usage()))
}

fn optional_usize_flag(args: &[String], flag: &str) -> Result<Option<usize>, String> {
    optional_flag(args, flag)?
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|err| format!("invalid {flag} `{raw}`: {err}"))
        })
        .transpose()
}
