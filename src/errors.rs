use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Transport error on {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Malformed response body from {endpoint}: {reason} (body: {preview})")]
    MalformedBody {
        endpoint: String,
        reason: String,
        preview: String,
    },

    #[error(
        "Invalid response during {phase}: poisoned values at {paths} (response: {body})",
        paths = .poisoned.join(", ")
    )]
    PoisonedValue {
        phase: String,
        poisoned: Vec<String>,
        body: Value,
    },

    #[error("Robot reported status '{status}': {message} (response: {body})")]
    TerminalErrorStatus {
        status: String,
        message: String,
        body: Value,
    },

    #[error("Calibration did not finish after {attempts} polls ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("Cancelled by operator")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CalibrationError {
    /// Process exit code for this failure. Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Transport { .. } => 2,
            Self::MalformedBody { .. } => 3,
            Self::PoisonedValue { .. } => 4,
            Self::TerminalErrorStatus { .. } => 5,
            Self::Timeout { .. } => 6,
            Self::Config(_) => 64,
            Self::Cancelled => 130,
        }
    }

    pub(crate) fn transport(endpoint: &str, reason: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}
