//! Pre-run link validation.
//!
//! A missing `include` otherwise surfaces as an opaque simulator error
//! halfway through the run. Scanning the sources first turns it into a
//! `HarnessError::UnresolvedSymbol` naming the symbol and its caller.

use crate::error::HarnessError;
use rvt_core::Program;
use rvt_runtime::LinkReport;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Labels a source defines and the call targets it uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSymbols {
    pub defined: BTreeSet<String>,
    /// Names declared `.globl`, defined here or not.
    pub globals: BTreeSet<String>,
    /// `(caller, callee)` in source order.
    pub calls: Vec<(String, String)>,
    /// Files named by `.import` directives, as written.
    pub imports: Vec<String>,
}

impl SourceSymbols {
    /// Labels other files can reference: defined here and declared `.globl`.
    pub fn exported(&self) -> impl Iterator<Item = &String> {
        self.defined.intersection(&self.globals)
    }
}

#[must_use]
pub fn scan_source(text: &str) -> SourceSymbols {
    let mut symbols = SourceSymbols::default();
    let mut caller = String::from("<top>");
    for raw in text.lines() {
        let mut line = raw.split('#').next().unwrap_or("").trim();
        while let Some((head, rest)) = line.split_once(':') {
            let label = head.trim();
            if !is_symbol(label) {
                break;
            }
            symbols.defined.insert(label.to_owned());
            caller = label.to_owned();
            line = rest.trim();
        }
        if line.is_empty() {
            continue;
        }

        let (mnemonic, operands) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, operands)) => (mnemonic, operands.trim()),
            None => (line, ""),
        };
        let operands = operands
            .split(',')
            .map(str::trim)
            .filter(|operand| !operand.is_empty())
            .collect::<Vec<_>>();
        let target = match (mnemonic, operands.as_slice()) {
            (".import", [path]) => {
                symbols.imports.push(path.trim_matches('"').to_owned());
                None
            }
            (".globl" | ".global", names) => {
                symbols.globals.extend(names.iter().map(|name| (*name).to_owned()));
                None
            }
            ("jal", [target]) | ("jal", [_, target]) | ("call", [target]) | ("tail", [target]) => {
                Some(*target)
            }
            _ => None,
        };
        if let Some(target) = target
            && is_symbol(target)
        {
            symbols.calls.push((caller.clone(), target.to_owned()));
        }
    }
    symbols
}

fn is_symbol(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_' || ch == '.')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || ch == '$')
}

/// Scans every linked source, following `.import` directives, and checks
/// that the routine and every call target resolve. A call resolves against
/// labels of its own file or `.globl` labels of any linked file; the routine
/// under test is called from the driver and so must be exported.
pub fn check_sources(program: &Program) -> Result<(), HarnessError> {
    let mut queue = program
        .linked_sources()
        .map(Path::to_path_buf)
        .collect::<VecDeque<_>>();
    let mut seen = BTreeSet::<PathBuf>::new();
    let mut exported = BTreeSet::new();
    let mut external_calls = Vec::new();

    while let Some(path) = queue.pop_front() {
        if !seen.insert(path.clone()) {
            continue;
        }
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarnessError::MissingSource { path });
            }
            Err(err) => {
                log::warn!(
                    "skipping link check: cannot read {}: {err}",
                    path.display()
                );
                return Ok(());
            }
        };
        let symbols = scan_source(&text);
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        queue.extend(symbols.imports.iter().map(|import| base.join(import)));
        exported.extend(symbols.exported().cloned());
        external_calls.extend(
            symbols
                .calls
                .into_iter()
                .filter(|(_, callee)| !symbols.defined.contains(callee)),
        );
    }

    if !exported.contains(&program.routine) {
        return Err(HarnessError::UnresolvedSymbol {
            symbol: program.routine.clone(),
            caller: program.entry_label().to_owned(),
        });
    }
    match external_calls
        .into_iter()
        .find(|(_, callee)| !exported.contains(callee))
    {
        Some((caller, symbol)) => Err(HarnessError::UnresolvedSymbol { symbol, caller }),
        None => Ok(()),
    }
}

/// Converts an engine's own link report into the first unresolved call.
pub fn check_report(report: &LinkReport) -> Result<(), HarnessError> {
    match report.unresolved.first() {
        Some(call) => Err(HarnessError::UnresolvedSymbol {
            symbol: call.symbol.clone(),
            caller: call.caller.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_sources, scan_source};
    use crate::error::HarnessError;
    use rvt_core::{DumpPlan, Program};
    use std::path::Path;

    const MATMUL: &str = "\
.globl matmul
.text
# matmul: a0..a6
matmul:
    ble a1, x0, error   # rows
    addi sp, sp, -4
outer:  jal ra, dot
    jal inner_done
inner_done: ret
error:
    li a1, 34
    j exit2
";

    fn program(dir: &Path, imports: &[&str], routine: &str) -> Program {
        Program {
            name: "link".to_owned(),
            imports: imports.iter().map(|name| dir.join(name)).collect(),
            runtime: None,
            data: Vec::new(),
            bindings: Vec::new(),
            routine: routine.to_owned(),
            dump: DumpPlan::default(),
        }
    }

    #[test]
    fn scan_finds_labels_and_calls() {
        let symbols = scan_source(MATMUL);
        assert!(symbols.defined.contains("matmul"));
        assert!(symbols.defined.contains("outer"));
        assert!(symbols.defined.contains("inner_done"));
        assert_eq!(
            symbols.calls,
            vec![
                ("outer".to_owned(), "dot".to_owned()),
                ("outer".to_owned(), "inner_done".to_owned()),
            ]
        );
    }

    #[test]
    fn missing_dependency_is_reported_with_caller() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        std::fs::write(dir.path().join("matmul.s"), MATMUL).unwrap();
        std::fs::write(dir.path().join("dot.s"), ".globl dot\ndot:\n    ret\n").unwrap();

        let err = check_sources(&program(dir.path(), &["matmul.s"], "matmul")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::UnresolvedSymbol { ref symbol, ref caller }
                if symbol == "dot" && caller == "outer"
        ));
        check_sources(&program(dir.path(), &["matmul.s", "dot.s"], "matmul")).unwrap();
    }

    #[test]
    fn labels_without_globl_stay_file_local() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        std::fs::write(dir.path().join("matmul.s"), MATMUL).unwrap();
        std::fs::write(dir.path().join("dot.s"), "dot:\n    ret\n").unwrap();
        let err =
            check_sources(&program(dir.path(), &["matmul.s", "dot.s"], "matmul")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::UnresolvedSymbol { ref symbol, .. } if symbol == "dot"
        ));

        std::fs::write(dir.path().join("relu.s"), "relu:\n    ret\n").unwrap();
        let err = check_sources(&program(dir.path(), &["relu.s"], "relu")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::UnresolvedSymbol { ref symbol, .. } if symbol == "relu"
        ));

        let symbols = scan_source(MATMUL);
        assert_eq!(symbols.exported().collect::<Vec<_>>(), vec!["matmul"]);
    }

    #[test]
    fn imports_inside_sources_are_followed() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        std::fs::write(dir.path().join("dot.s"), ".globl dot\ndot:\n    ret\n").unwrap();
        std::fs::write(
            dir.path().join("main.s"),
            ".import dot.s\n.globl main\nmain:\n    call dot\n    ret\n",
        )
        .unwrap();
        check_sources(&program(dir.path(), &["main.s"], "main")).unwrap();
    }

    #[test]
    fn missing_files_and_routines_are_distinct() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let err = check_sources(&program(dir.path(), &["absent.s"], "absent")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::MissingSource { ref path } if path == &dir.path().join("absent.s")
        ));

        std::fs::write(dir.path().join("abs.s"), ".globl abs\nabs:\n    ret\n").unwrap();
        let err = check_sources(&program(dir.path(), &["abs.s"], "relu")).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::UnresolvedSymbol { ref symbol, .. } if symbol == "relu"
        ));
    }
}
