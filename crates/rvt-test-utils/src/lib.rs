#![forbid(unsafe_code)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use rvt_core::artifact_stem;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_LOG_SCHEMA_VERSION: &str = "rvtest.test-log.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestLogEnv {
    pub rust_version: String,
    pub os: String,
    pub cargo_target_dir: String,
    pub timestamp_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TestPhaseTimings {
    pub setup_ms: u64,
    pub execute_ms: u64,
    pub verify_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestLogV1 {
    pub schema_version: String,
    pub test_id: String,
    pub fixture_id: String,
    pub seed: Option<u64>,
    /// Engine name and version, e.g. `venus (java -jar venus.jar)`.
    pub engine: String,
    pub fault: Option<String>,
    pub env: TestLogEnv,
    pub artifact_refs: Vec<String>,
    pub result: TestResult,
    pub duration_ms: u64,
    pub details: Option<String>,
    pub phase_timings: TestPhaseTimings,
}

impl TestLogV1 {
    #[must_use]
    pub fn unit(
        test_id: impl Into<String>,
        fixture_id: impl Into<String>,
        engine: impl Into<String>,
        result: TestResult,
    ) -> Self {
        Self {
            schema_version: TEST_LOG_SCHEMA_VERSION.to_owned(),
            test_id: test_id.into(),
            fixture_id: fixture_id.into(),
            seed: capture_seed(),
            engine: engine.into(),
            fault: None,
            env: capture_env(),
            artifact_refs: Vec::new(),
            result,
            duration_ms: 0,
            details: None,
            phase_timings: TestPhaseTimings::default(),
        }
    }

    /// Writes the log as pretty JSON to `<root>/<test id>.json`, creating
    /// directories as needed. Returns the written path.
    pub fn write_under(&self, root: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(root)?;
        let path = root.join(format!("{}.json", artifact_stem(&self.test_id)));
        let encoded = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, encoded)?;
        Ok(path)
    }
}

#[must_use]
pub fn capture_env() -> TestLogEnv {
    TestLogEnv {
        rust_version: rust_version().to_owned(),
        os: std::env::consts::OS.to_owned(),
        cargo_target_dir: std::env::var("CARGO_TARGET_DIR")
            .unwrap_or_else(|_| "<default>".to_owned()),
        timestamp_unix_ms: now_unix_ms_u64(),
    }
}

pub fn fixture_id_from_json<T: Serialize>(fixture: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(fixture)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[must_use]
pub fn property_test_case_count() -> u32 {
    if let Ok(raw) = std::env::var("RVT_PROPTEST_CASES")
        && let Ok(parsed) = raw.parse::<u32>()
        && parsed > 0
    {
        return parsed;
    }

    if std::env::var_os("CI").is_some() {
        128
    } else {
        32
    }
}

#[must_use]
pub fn capture_seed() -> Option<u64> {
    if let Ok(raw) = std::env::var("RVT_SEED")
        && let Ok(seed) = raw.parse::<u64>()
    {
        return Some(seed);
    }

    if let Ok(raw) = std::env::var("PROPTEST_RNG_SEED")
        && let Ok(seed) = raw.parse::<u64>()
    {
        return Some(seed);
    }

    None
}

/// RNG for randomized scenarios. Uses the captured seed when one is set so
/// a failing run can be replayed; otherwise draws a fresh seed. The seed is
/// returned for logging either way.
#[must_use]
pub fn scenario_rng() -> (StdRng, u64) {
    let seed = capture_seed().unwrap_or_else(rand::random);
    (StdRng::seed_from_u64(seed), seed)
}

fn now_unix_ms_u64() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| u64::try_from(duration.as_millis()).ok())
        .unwrap_or(0)
}

/// `rustc --version`, queried once per process.
fn rust_version() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION.get_or_init(|| {
        let output = Command::new("rustc").arg("--version").output();
        match output {
            Ok(result) if result.status.success() => {
                String::from_utf8_lossy(&result.stdout).trim().to_owned()
            }
            _ => "rustc <unknown>".to_owned(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{
        TEST_LOG_SCHEMA_VERSION, TestLogV1, TestResult, capture_env, fixture_id_from_json,
        property_test_case_count,
    };

    #[test]
    fn test_fixture_digest_deterministic_json() {
        let fixture = serde_json::json!({
            "routine": "relu",
            "array": [1, -2, 3]
        });
        let digest_a = fixture_id_from_json(&fixture).expect("digest should build");
        let digest_b = fixture_id_from_json(&fixture).expect("digest should build");
        assert_eq!(digest_a, digest_b);
        assert_eq!(digest_a.len(), 64);
    }

    #[test]
    fn test_property_case_count_is_positive() {
        assert!(property_test_case_count() > 0);
    }

    #[test]
    fn test_log_schema_round_trip_serialization() {
        let log = TestLogV1::unit(
            "relu::schema_round_trip",
            "fixture-id",
            "host",
            TestResult::Pass,
        );
        assert_eq!(log.schema_version, TEST_LOG_SCHEMA_VERSION);
        let encoded = serde_json::to_string(&log).expect("serialize should work");
        let decoded: TestLogV1 = serde_json::from_str(&encoded).expect("deserialize should work");
        assert_eq!(decoded, log);
    }

    #[test]
    fn rust_version_is_captured_once() {
        let first = capture_env();
        let second = TestLogV1::unit("abs::env", "fixture", "host", TestResult::Pass).env;
        assert_eq!(first.rust_version, second.rust_version);
        assert!(std::ptr::eq(super::rust_version(), super::rust_version()));
    }

    #[test]
    fn test_log_writes_under_sanitized_name() {
        let dir = tempfile::tempdir().expect("tempdir should build");
        let log = TestLogV1::unit("relu::simple", "fixture", "host", TestResult::Fail);
        let path = log.write_under(&dir.path().join("logs")).expect("write should work");
        assert_eq!(path.file_name().unwrap(), "relu__simple.json");
        let raw = std::fs::read_to_string(path).expect("log should exist");
        assert!(raw.contains("\"result\": \"fail\""));
    }
}
