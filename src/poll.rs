//! Calibration poll loop.
//!
//! `Started -> Polling -> {Success, Failed}`. Every `/calibrate` response is validated
//! before any field is read. Poisoned responses are saved through the diagnostics sink
//! and abort the loop unless `force` is set, in which case the defaulted fields are used.

use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::CancelSignal;
use crate::config::PollPolicy;
use crate::diagnostics::DiagnosticSink;
use crate::errors::CalibrationError;
use crate::response::{CalibrationProgress, CalibrationStatus, validate};
use crate::robot::{RobotApi, RobotCommand};

/// Diagnostics phase of the calibration-trigger response.
pub const PHASE_CALIBRATE_RESPONSE: &str = "calibrate_response";
/// Diagnostics phase of every later poll.
pub const PHASE_CALIBRATE_POLLING: &str = "calibrate_polling";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Started,
    Polling,
    Success,
    Failed,
}

/// State reached after observing `status`.
pub fn next_state(status: &CalibrationStatus) -> PollState {
    match status {
        CalibrationStatus::InProgress => PollState::Polling,
        CalibrationStatus::Success => PollState::Success,
        CalibrationStatus::Error | CalibrationStatus::Unrecognized(_) => PollState::Failed,
    }
}

/// Things the loop reports while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Progress(CalibrationProgress),
    /// An invalid response was accepted because `force` is set.
    Overridden { phase: String, poisoned: Vec<String> },
    /// `total_nb_steps` went down between polls of the same run.
    TotalStepsDecreased { previous: u64, observed: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub progress: CalibrationProgress,
    pub polls: u32,
    pub overridden: u32,
    pub elapsed: Duration,
}

pub struct CalibrationPoller<'a> {
    robot: &'a dyn RobotApi,
    policy: &'a PollPolicy,
    diagnostics: &'a dyn DiagnosticSink,
    force: bool,
    cancel: CancelSignal,
}

impl<'a> CalibrationPoller<'a> {
    pub fn new(
        robot: &'a dyn RobotApi,
        policy: &'a PollPolicy,
        diagnostics: &'a dyn DiagnosticSink,
        force: bool,
    ) -> Self {
        Self {
            robot,
            policy,
            diagnostics,
            force,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Trigger calibration and poll until it reaches a terminal state.
    pub async fn run(
        &self,
        mut on_event: impl FnMut(&PollEvent),
    ) -> Result<PollOutcome, CalibrationError> {
        let started = Instant::now();
        let mut state = PollState::Started;
        let mut polls: u32 = 0;
        let mut overridden: u32 = 0;
        let mut total_steps: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(CalibrationError::Cancelled);
            }

            let phase = if state == PollState::Started {
                PHASE_CALIBRATE_RESPONSE
            } else {
                PHASE_CALIBRATE_POLLING
            };

            let body = self.robot.send(&RobotCommand::Calibrate).await?;
            polls += 1;

            let verdict = validate(&body);
            if !verdict.is_valid() {
                self.diagnostics.persist(phase, &body);
                if !self.force {
                    log::debug!("poll {polls}: {state:?} -> Failed (invalid response)");
                    return Err(CalibrationError::PoisonedValue {
                        phase: phase.to_string(),
                        poisoned: verdict.poisoned,
                        body,
                    });
                }
                log::warn!(
                    "{phase}: continuing past {} poisoned value(s) because force is set",
                    verdict.poisoned_count()
                );
                overridden += 1;
                on_event(&PollEvent::Overridden {
                    phase: phase.to_string(),
                    poisoned: verdict.poisoned,
                });
            }

            let mut progress = CalibrationProgress::from_response(&body);
            if progress.total_steps == 0 {
                progress.total_steps = total_steps;
            } else {
                if total_steps > 0 && progress.total_steps < total_steps {
                    on_event(&PollEvent::TotalStepsDecreased {
                        previous: total_steps,
                        observed: progress.total_steps,
                    });
                }
                total_steps = progress.total_steps;
            }

            let next = next_state(&progress.status);
            log::debug!("poll {polls}: {state:?} -> {next:?} ({})", progress.status);
            state = next;
            on_event(&PollEvent::Progress(progress.clone()));

            match state {
                PollState::Success => {
                    return Ok(PollOutcome {
                        progress,
                        polls,
                        overridden,
                        elapsed: started.elapsed(),
                    });
                }
                PollState::Failed => {
                    return Err(CalibrationError::TerminalErrorStatus {
                        status: progress.status.to_string(),
                        message: progress.message,
                        body,
                    });
                }
                PollState::Started | PollState::Polling => {}
            }

            let elapsed = started.elapsed();
            let over_polls = self.policy.max_polls.is_some_and(|max| polls >= max);
            let over_time = self.policy.timeout.is_some_and(|limit| elapsed >= limit);
            if over_polls || over_time {
                return Err(CalibrationError::Timeout {
                    attempts: polls,
                    elapsed,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                _ = self.cancel.cancelled() => return Err(CalibrationError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_status() {
        assert_eq!(next_state(&CalibrationStatus::InProgress), PollState::Polling);
        assert_eq!(next_state(&CalibrationStatus::Success), PollState::Success);
        assert_eq!(next_state(&CalibrationStatus::Error), PollState::Failed);
        assert_eq!(
            next_state(&CalibrationStatus::Unrecognized("paused".to_string())),
            PollState::Failed
        );
    }
}
