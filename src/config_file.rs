use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = ".armcal/config.json";

/// Optional on-disk defaults, overridden by environment and flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub robot_id: Option<u32>,

    /// Seconds between calibration polls (fractional allowed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<f64>,

    /// 0 disables the bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<u32>,

    /// 0 disables the bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_timeout_secs: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulate: Option<bool>,
}

impl ConfigFile {
    /// Load from `path`; a missing file yields the empty config.
    pub fn load_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_config() {
        let tmp = TempDir::new().unwrap();
        let cfg = ConfigFile::load_at(&tmp.path().join("config.json")).unwrap();
        assert_eq!(cfg, ConfigFile::default());
    }

    #[test]
    fn partial_file_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "host": "arm.local", "port": 8020, "force": true }"#).unwrap();
        let cfg = ConfigFile::load_at(&path).unwrap();
        assert_eq!(cfg.host.as_deref(), Some("arm.local"));
        assert_eq!(cfg.port, Some(8020));
        assert_eq!(cfg.force, Some(true));
        assert!(cfg.robot_id.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{ "hots": "typo" }"#).unwrap();
        let err = ConfigFile::load_at(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
