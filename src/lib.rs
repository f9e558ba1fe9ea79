pub mod cancel;
pub mod config;
mod config_file;
pub mod diagnostics;
mod errors;
pub mod orchestrator;
pub mod poll;
pub mod response;
pub mod robot;
pub mod sanitize;
pub mod ui;

pub use crate::cancel::{CancelHandle, CancelSignal};
pub use crate::config::{ConfigOverrides, PollPolicy, RunConfig, RunMode};
pub use crate::config_file::ConfigFile;
pub use crate::diagnostics::{DiagnosticSink, DiagnosticsDir, MemorySink};
pub use crate::errors::CalibrationError;
pub use crate::orchestrator::{CalibrationOrchestrator, WorkflowReport, WorkflowStep};
pub use crate::poll::{CalibrationPoller, PollEvent, PollOutcome, PollState};
pub use crate::response::{
    ApiResponse, CalibrationProgress, CalibrationStatus, ValidationVerdict, read_field,
    read_status, validate,
};
pub use crate::robot::{MoveTarget, RobotApi, RobotCommand, create_robot};
