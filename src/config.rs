use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config_file::{ConfigFile, DEFAULT_CONFIG_PATH};
use crate::errors::CalibrationError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_MAX_POLLS: u32 = 300;
pub const DEFAULT_POLL_TIMEOUT_SECS: f64 = 600.0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_DIAGNOSTICS_DIR: &str = ".armcal/diagnostics";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Real HTTP calls against the robot-control service
    Live,
    /// Echo intended calls, answer with canned bodies
    DryRun,
    /// Canned bodies per endpoint, no output about requests
    Simulate,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::DryRun => "dry-run",
            Self::Simulate => "simulate",
        }
    }
}

/// Bounds on the calibration poll loop. `None` disables a bound.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS),
            max_polls: Some(DEFAULT_MAX_POLLS),
            timeout: Some(Duration::from_secs_f64(DEFAULT_POLL_TIMEOUT_SECS)),
        }
    }
}

/// Everything one calibration run needs. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub host: String,
    pub port: u16,
    pub robot_id: u32,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
    pub retries: u32,
    pub diagnostics_dir: PathBuf,
    pub force: bool,
    pub mode: RunMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            robot_id: 0,
            poll: PollPolicy::default(),
            request_timeout: Duration::from_secs_f64(DEFAULT_REQUEST_TIMEOUT_SECS),
            retries: 0,
            diagnostics_dir: PathBuf::from(DEFAULT_DIAGNOSTICS_DIR),
            force: false,
            mode: RunMode::Live,
        }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub robot_id: Option<u32>,
    pub poll_interval_secs: Option<f64>,
    pub max_polls: Option<u32>,
    pub poll_timeout_secs: Option<f64>,
    pub request_timeout_secs: Option<f64>,
    pub retries: Option<u32>,
    pub diagnostics_dir: Option<PathBuf>,
    pub force: Option<bool>,
    pub dry_run: Option<bool>,
    pub simulate: Option<bool>,
    pub config_path: Option<PathBuf>,
}

impl RunConfig {
    /// Resolve flags > environment (after `.env`) > config file > defaults.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, CalibrationError> {
        let _ = dotenvy::dotenv();

        let explicit_path = overrides
            .config_path
            .clone()
            .or_else(|| env::var("ARMCAL_CONFIG").ok().map(PathBuf::from));
        let file = match &explicit_path {
            Some(path) if !path.exists() => {
                return Err(CalibrationError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            Some(path) => load_file(path)?,
            None => load_file(Path::new(DEFAULT_CONFIG_PATH))?,
        };

        Self::resolve_with(&overrides, &file, |key| env::var(key).ok())
    }

    /// Resolution with an injectable environment lookup.
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        file: &ConfigFile,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CalibrationError> {
        let env = Env(&env_lookup);

        let host = overrides
            .host
            .clone()
            .or(env.get("ARMCAL_HOST"))
            .or_else(|| file.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err(CalibrationError::Config("host is empty".to_string()));
        }

        let port = pick(overrides.port, env.parse("ARMCAL_PORT")?, file.port, DEFAULT_PORT);
        let robot_id = pick(overrides.robot_id, env.parse("ARMCAL_ROBOT_ID")?, file.robot_id, 0);

        let interval = seconds(
            "poll interval",
            pick(
                overrides.poll_interval_secs,
                env.parse("ARMCAL_POLL_INTERVAL")?,
                file.poll_interval_secs,
                DEFAULT_POLL_INTERVAL_SECS,
            ),
        )?;
        let max_polls = pick(
            overrides.max_polls,
            env.parse("ARMCAL_MAX_POLLS")?,
            file.max_polls,
            DEFAULT_MAX_POLLS,
        );
        let poll_timeout = seconds(
            "poll timeout",
            pick(
                overrides.poll_timeout_secs,
                env.parse("ARMCAL_POLL_TIMEOUT")?,
                file.poll_timeout_secs,
                DEFAULT_POLL_TIMEOUT_SECS,
            ),
        )?;
        let request_timeout = seconds(
            "request timeout",
            pick(
                overrides.request_timeout_secs,
                env.parse("ARMCAL_REQUEST_TIMEOUT")?,
                file.request_timeout_secs,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
        )?;
        if request_timeout.is_zero() {
            return Err(CalibrationError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }

        let retries = pick(overrides.retries, env.parse("ARMCAL_RETRIES")?, file.retries, 0);

        let diagnostics_dir = overrides
            .diagnostics_dir
            .clone()
            .or(env.get("ARMCAL_DIAGNOSTICS_DIR").map(PathBuf::from))
            .or_else(|| file.diagnostics_dir.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIAGNOSTICS_DIR));

        let force = pick(overrides.force, env.flag("ARMCAL_FORCE")?, file.force, false);
        let dry_run = pick(overrides.dry_run, env.flag("ARMCAL_DRY_RUN")?, file.dry_run, false);
        let simulate = pick(
            overrides.simulate,
            env.flag("ARMCAL_SIMULATE")?,
            file.simulate,
            false,
        );

        let mode = match (dry_run, simulate) {
            (true, true) => {
                return Err(CalibrationError::Config(
                    "dry-run and simulate are mutually exclusive".to_string(),
                ));
            }
            (true, false) => RunMode::DryRun,
            (false, true) => RunMode::Simulate,
            (false, false) => RunMode::Live,
        };

        Ok(Self {
            host,
            port,
            robot_id,
            poll: PollPolicy {
                interval,
                max_polls: (max_polls > 0).then_some(max_polls),
                timeout: (!poll_timeout.is_zero()).then_some(poll_timeout),
            },
            request_timeout,
            retries,
            diagnostics_dir,
            force,
            mode,
        })
    }

    /// `scheme://host:port`, defaulting the scheme to `http`.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }
}

fn load_file(path: &Path) -> Result<ConfigFile, CalibrationError> {
    ConfigFile::load_at(path).map_err(|e| CalibrationError::Config(format!("{e:#}")))
}

fn pick<T>(flag: Option<T>, env: Option<T>, file: Option<T>, default: T) -> T {
    flag.or(env).or(file).unwrap_or(default)
}

fn seconds(what: &str, secs: f64) -> Result<Duration, CalibrationError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(CalibrationError::Config(format!(
            "{what} must be a non-negative number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| CalibrationError::Config(format!("{what} of {secs} seconds: {e}")))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, CalibrationError> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|_| {
                    CalibrationError::Config(format!("{key}: invalid value '{raw}'"))
                })
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, CalibrationError> {
        self.get(key)
            .map(|raw| {
                parse_bool(&raw).ok_or_else(|| {
                    CalibrationError::Config(format!("{key}: expected a boolean, got '{raw}'"))
                })
            })
            .transpose()
    }
}
