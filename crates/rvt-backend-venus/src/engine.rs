use crate::config::VenusConfig;
use rvt_core::{ExecutionResult, Program, Termination, artifact_stem, split_snapshot};
use rvt_runtime::{Engine, EngineError, RunRequest};
use std::path::PathBuf;
use std::process::Command;

/// stderr fragments Venus and the JVM print when the simulation itself
/// failed rather than the program exiting.
const CRASH_MARKERS: &[&str] = &[
    "Exception in thread",
    "SimulatorError",
    "AlignmentError",
    "StoreError",
    "AssemblerError",
    "LinkerError",
];

#[derive(Debug, Clone)]
pub struct VenusEngine {
    config: VenusConfig,
}

impl VenusEngine {
    /// Fails when the jar is missing, so suites can skip instead of crashing
    /// on the first test.
    pub fn new(config: VenusConfig) -> Result<Self, EngineError> {
        if !config.venus_jar.is_file() {
            return Err(EngineError::Unavailable {
                engine: "venus".to_owned(),
                detail: format!("{} not found", config.venus_jar.display()),
            });
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &VenusConfig {
        &self.config
    }

    fn program_path(&self, program: &Program, request: &RunRequest) -> PathBuf {
        let stem = artifact_stem(&program.name);
        let file = match request.fault {
            Some(fault) => format!("{stem}.{fault}.s"),
            None => format!("{stem}.s"),
        };
        self.config.assembly_dir.join(file)
    }

    /// Shell-style rendering of the invocation, kept for replay.
    #[must_use]
    pub fn render_command(&self, program_path: &std::path::Path, args: &[String]) -> String {
        let mut parts = vec![
            self.config.java_bin.display().to_string(),
            "-jar".to_owned(),
            self.config.venus_jar.display().to_string(),
        ];
        parts.extend(self.config.flags.iter().cloned());
        parts.push(program_path.display().to_string());
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }
}

impl Engine for VenusEngine {
    fn name(&self) -> &str {
        "venus"
    }

    fn version(&self) -> String {
        format!("({})", self.config.venus_jar.display())
    }

    fn run(
        &self,
        program: &Program,
        request: &RunRequest,
    ) -> Result<ExecutionResult, EngineError> {
        let linked;
        let program = match request.fault {
            Some(fault) => {
                if program.runtime.is_none() {
                    return Err(EngineError::FaultUnsupported {
                        fault,
                        detail: "program links no runtime library".to_owned(),
                    });
                }
                linked = program.with_runtime(Some(self.config.fault_runtime(fault)?));
                &linked
            }
            None => program,
        };

        let path = self.program_path(program, request);
        let write = |err: std::io::Error| EngineError::Launch {
            command: format!("write {}", path.display()),
            detail: err.to_string(),
        };
        std::fs::create_dir_all(&self.config.assembly_dir).map_err(write)?;
        std::fs::write(&path, program.render()).map_err(write)?;

        let rendered = self.render_command(&path, &request.args);
        log::debug!("venus: {rendered} (cwd {})", self.config.work_dir.display());
        let output = Command::new(&self.config.java_bin)
            .arg("-jar")
            .arg(&self.config.venus_jar)
            .args(&self.config.flags)
            .arg(&path)
            .args(&request.args)
            .current_dir(&self.config.work_dir)
            .output()
            .map_err(|err| EngineError::Launch {
                command: rendered.clone(),
                detail: err.to_string(),
            })?;

        let raw_stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let crash_marker = CRASH_MARKERS.iter().find(|marker| stderr.contains(**marker));
        let mut termination = match (output.status.code(), crash_marker) {
            (None, _) => Termination::Crashed("venus terminated by a signal".to_owned()),
            (Some(_), Some(marker)) => Termination::Crashed(format!("venus reported {marker}")),
            (Some(code), None) => Termination::Exited(code),
        };

        let (stdout, snapshot) = match split_snapshot(&raw_stdout) {
            Ok(parts) => parts,
            Err(err) => {
                termination = Termination::Crashed(err.to_string());
                (raw_stdout, None)
            }
        };
        Ok(ExecutionResult {
            termination,
            stdout,
            stderr,
            snapshot,
            command: Some(rendered),
            program_path: Some(path),
        })
    }
}
