use rvt_core::FaultPoint;
use rvt_runtime::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenusConfig {
    pub java_bin: PathBuf,
    pub venus_jar: PathBuf,
    /// Extra simulator flags placed before the program path.
    pub flags: Vec<String>,
    /// Directory of runtime-library variants, one per fault point, named
    /// `<point>.s` (e.g. `malloc.s` fails its first malloc).
    pub fault_runtime_dir: Option<PathBuf>,
    /// Where rendered programs are written before the run.
    pub assembly_dir: PathBuf,
    /// Simulator working directory; program filenames resolve here.
    pub work_dir: PathBuf,
}

impl VenusConfig {
    #[must_use]
    pub fn new(venus_jar: impl Into<PathBuf>, assembly_dir: &Path, work_dir: &Path) -> Self {
        Self {
            java_bin: PathBuf::from("java"),
            venus_jar: venus_jar.into(),
            flags: Vec::new(),
            fault_runtime_dir: None,
            assembly_dir: assembly_dir.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Reads `RVT_VENUS_JAR` (required), `RVT_JAVA`, `RVT_VENUS_FLAGS`
    /// (whitespace separated) and `RVT_FAULT_RUNTIME_DIR`.
    pub fn from_env(assembly_dir: &Path, work_dir: &Path) -> Result<Self, EngineError> {
        let jar = std::env::var_os("RVT_VENUS_JAR").ok_or_else(|| EngineError::Unavailable {
            engine: "venus".to_owned(),
            detail: "RVT_VENUS_JAR is not set".to_owned(),
        })?;
        let mut config = Self::new(jar, assembly_dir, work_dir);
        if let Some(java) = std::env::var_os("RVT_JAVA") {
            config.java_bin = PathBuf::from(java);
        }
        if let Ok(raw) = std::env::var("RVT_VENUS_FLAGS") {
            config.flags = raw.split_whitespace().map(str::to_owned).collect();
        }
        if let Some(dir) = std::env::var_os("RVT_FAULT_RUNTIME_DIR") {
            config.fault_runtime_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    /// Runtime variant that fails at `point`, if one is configured and present.
    pub fn fault_runtime(&self, point: FaultPoint) -> Result<PathBuf, EngineError> {
        let dir = self
            .fault_runtime_dir
            .as_ref()
            .ok_or_else(|| EngineError::FaultUnsupported {
                fault: point,
                detail: "no fault runtime directory configured".to_owned(),
            })?;
        let path = dir.join(format!("{point}.s"));
        if !path.is_file() {
            return Err(EngineError::FaultUnsupported {
                fault: point,
                detail: format!("{} does not exist", path.display()),
            });
        }
        Ok(path)
    }
}
