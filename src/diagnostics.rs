//! Best-effort persistence of raw responses that failed validation.

use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Where invalid responses are dumped before the abort/continue decision.
///
/// Implementations must never fail the caller: write errors are logged and dropped.
pub trait DiagnosticSink: Send + Sync {
    fn persist(&self, phase: &str, body: &Value) -> Option<PathBuf>;
}

/// Writes `{phase}_{UTC timestamp}.json` files under a directory.
#[derive(Debug, Clone)]
pub struct DiagnosticsDir {
    root: PathBuf,
}

impl DiagnosticsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn write(&self, phase: &str, body: &Value) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let path = self.root.join(format!("{phase}_{stamp}.json"));
        let content = serde_json::to_string_pretty(body).map_err(io::Error::other)?;
        fs::write(&path, content)?;
        Ok(path)
    }
}

impl DiagnosticSink for DiagnosticsDir {
    fn persist(&self, phase: &str, body: &Value) -> Option<PathBuf> {
        match self.write(phase, body) {
            Ok(path) => {
                log::info!("saved {phase} diagnostics to {}", path.display());
                Some(path)
            }
            Err(err) => {
                log::warn!(
                    "could not write {phase} diagnostics under {}: {err}",
                    self.root.display()
                );
                None
            }
        }
    }
}

/// In-memory sink, for runs that must not touch the filesystem.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, Value)> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn phases(&self) -> Vec<String> {
        self.records().into_iter().map(|(phase, _)| phase).collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn persist(&self, phase: &str, body: &Value) -> Option<PathBuf> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((phase.to_string(), body.clone()));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn writes_phase_tagged_file_and_creates_dir() {
        let tmp = TempDir::new().unwrap();
        let sink = DiagnosticsDir::new(tmp.path().join("nested/diag"));
        let body = json!({"calibration_status": "in_progress", "current_step": "NaN"});

        let path = sink.persist("calibrate_response", &body).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("calibrate_response_"));
        assert!(name.ends_with("Z.json"));
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, body);
    }

    #[test]
    fn unwritable_root_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a dir").unwrap();
        let sink = DiagnosticsDir::new(blocker.join("diag"));

        assert!(sink.persist("joints_read", &json!({"joints": [null]})).is_none());
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.persist("calibrate_response", &json!({}));
        sink.persist("calibrate_polling", &json!({}));
        assert_eq!(sink.phases(), vec!["calibrate_response", "calibrate_polling"]);
    }

    #[test]
    fn memory_sink_keeps_recording_after_a_panicked_holder() {
        let sink = std::sync::Arc::new(MemorySink::new());
        let held = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.records.lock().unwrap();
            panic!("holder panics with the lock taken");
        })
        .join();
        assert!(sink.records.is_poisoned());

        sink.persist("joints_read", &json!({"joints": [null]}));
        assert_eq!(sink.phases(), vec!["joints_read"]);
    }
}
