use std::process::Command;
use std::sync::{Mutex, OnceLock};

use tempfile::TempDir;

use armcal::{ConfigOverrides, RunConfig, RunMode};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const KEYS: [&str; 5] = [
    "ARMCAL_HOST",
    "ARMCAL_PORT",
    "ARMCAL_FORCE",
    "ARMCAL_SIMULATE",
    "ARMCAL_CONFIG",
];

struct EnvGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    fn clear() -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let saved = KEYS.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        // SAFETY: env mutation is guarded by ENV_LOCK, ensuring exclusive access.
        unsafe {
            for key in KEYS {
                std::env::remove_var(key);
            }
        }

        Self { _lock: lock, saved }
    }

    fn set(&self, key: &str, value: &str) {
        // SAFETY: env mutation is guarded by ENV_LOCK, ensuring exclusive access.
        unsafe {
            std::env::set_var(key, value);
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: env mutation is guarded by ENV_LOCK, ensuring exclusive access.
        unsafe {
            for (key, value) in &self.saved {
                match value {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

#[test]
fn env_configures_run_and_flags_override() {
    let guard = EnvGuard::clear();
    guard.set("ARMCAL_HOST", "arm.local");
    guard.set("ARMCAL_PORT", "8020");
    guard.set("ARMCAL_FORCE", "true");

    let cfg = RunConfig::resolve(ConfigOverrides {
        port: Some(9000),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(cfg.base_url(), "http://arm.local:9000");
    assert!(cfg.force);
    assert_eq!(cfg.mode, RunMode::Live);
}

#[test]
fn config_file_from_env_path() {
    let guard = EnvGuard::clear();
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("armcal.json");
    std::fs::write(&path, r#"{ "robot_id": 4, "simulate": true }"#).unwrap();
    guard.set("ARMCAL_CONFIG", path.to_str().unwrap());

    let cfg = RunConfig::resolve(ConfigOverrides::default()).unwrap();
    assert_eq!(cfg.robot_id, 4);
    assert_eq!(cfg.mode, RunMode::Simulate);
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let _guard = EnvGuard::clear();
    let err = RunConfig::resolve(ConfigOverrides {
        config_path: Some("/nonexistent/armcal.json".into()),
        ..Default::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn simulated_binary_run_exits_zero() {
    let _guard = EnvGuard::clear();
    let tmp = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_armcal"))
        .env("NO_COLOR", "1")
        .args(["--simulate", "--poll-interval", "0", "--diagnostics-dir"])
        .arg(tmp.path().join("diag"))
        .current_dir(tmp.path())
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("Calibration complete: step 10/10"));
    assert!(stdout.contains("Re-enabling torque"));
    assert!(stdout.contains("Verification move"));
}

#[test]
fn dry_run_echoes_requests() {
    let _guard = EnvGuard::clear();
    let tmp = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_armcal"))
        .env("NO_COLOR", "1")
        .args(["--dry-run", "--poll-interval", "0", "--robot-id", "3"])
        .current_dir(tmp.path())
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("/torque/toggle?robot_id=3"));
    assert!(stdout.contains(r#"{"torque_status":false}"#));
}

#[test]
fn conflicting_modes_exit_with_config_code() {
    let _guard = EnvGuard::clear();
    let tmp = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_armcal"))
        .env("NO_COLOR", "1")
        .args(["--dry-run", "--simulate"])
        .current_dir(tmp.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(64));
}
