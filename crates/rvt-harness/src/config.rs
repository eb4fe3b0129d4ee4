use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory holding the routines under test (`abs.s`, `dot.s`, ...).
    pub source_root: PathBuf,
    /// Runtime library linked after the dependencies. `None` links nothing.
    pub runtime_source: Option<PathBuf>,
    /// Where synthesized programs are written, one file per test id.
    pub assembly_dir: PathBuf,
    /// Working directory of the engine; logical filenames resolve here.
    pub work_dir: PathBuf,
    pub log_root: PathBuf,
    pub write_logs: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let repo_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        Self::rooted_at(&repo_root).with_env_overrides()
    }

    /// Conventional layout under one project directory: `src/` for sources
    /// and `utils.s`, `assembly/` for programs, logs under
    /// `artifacts/testing/logs`.
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        let source_root = root.join("src");
        Self {
            runtime_source: Some(source_root.join("utils.s")),
            source_root,
            assembly_dir: root.join("assembly"),
            work_dir: root.to_path_buf(),
            log_root: root.join("artifacts/testing/logs"),
            write_logs: false,
        }
    }

    /// Applies `RVT_SOURCE_ROOT`, `RVT_WORK_DIR`, `RVT_ASSEMBLY_DIR` and
    /// `RVT_WRITE_LOGS`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(root) = std::env::var_os("RVT_SOURCE_ROOT") {
            self.source_root = PathBuf::from(root);
            self.runtime_source = Some(self.source_root.join("utils.s"));
        }
        if let Some(dir) = std::env::var_os("RVT_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = std::env::var_os("RVT_ASSEMBLY_DIR") {
            self.assembly_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("RVT_WRITE_LOGS") {
            self.write_logs = matches!(raw.as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// Resolves a source name like `dot.s` against `source_root`.
    #[must_use]
    pub fn source(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.source_root.join(name)
        }
    }

    /// Resolves a logical filename against `work_dir`.
    #[must_use]
    pub fn work_path(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.work_dir.join(name)
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[cfg(test)]
mod tests {
    use super::HarnessConfig;
    use std::path::Path;

    #[test]
    fn rooted_layout() {
        let config = HarnessConfig::rooted_at(Path::new("/proj"));
        assert_eq!(config.source("dot.s"), Path::new("/proj/src/dot.s"));
        assert_eq!(config.runtime_source.as_deref(), Some(Path::new("/proj/src/utils.s")));
        assert_eq!(
            config.work_path("outputs/a.bin"),
            Path::new("/proj/outputs/a.bin")
        );
        assert_eq!(config.source("/abs/x.s"), Path::new("/abs/x.s"));
        assert!(!config.write_logs);
    }
}
