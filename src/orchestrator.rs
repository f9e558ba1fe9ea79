use std::fmt;

use serde::Serialize;

use crate::cancel::CancelSignal;
use crate::config::RunConfig;
use crate::diagnostics::DiagnosticSink;
use crate::errors::CalibrationError;
use crate::poll::{CalibrationPoller, PollEvent};
use crate::response::{ApiResponse, CalibrationProgress, read_field, read_joints, validate};
use crate::robot::{MoveTarget, RobotApi, RobotCommand};
use crate::ui;

/// Diagnostics phase for the post-calibration joint read.
pub const PHASE_JOINTS_READ: &str = "joints_read";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    InitPose,
    TorqueOff,
    Calibrate,
    ValidateJoints,
    TorqueOn,
    VerificationMove,
    ReadJointsFinal,
}

impl WorkflowStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitPose => "Moving to initial pose",
            Self::TorqueOff => "Disabling torque",
            Self::Calibrate => "Running calibration",
            Self::ValidateJoints => "Validating joint readings",
            Self::TorqueOn => "Re-enabling torque",
            Self::VerificationMove => "Verification move",
            Self::ReadJointsFinal => "Reading final joint positions",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a successful run went through.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowReport {
    pub completed: Vec<WorkflowStep>,
    /// Every progress observation of the poll loop, in order.
    pub progress: Vec<CalibrationProgress>,
    pub calibration: CalibrationProgress,
    pub polls: u32,
    /// Invalid calibration responses accepted because of `force`.
    pub overridden_polls: u32,
    /// Joint validation failed and `force` let the run continue.
    pub joints_overridden: bool,
    pub calibrated_joints: Vec<f64>,
    pub final_joints: Vec<f64>,
}

pub struct CalibrationOrchestrator<'a> {
    robot: &'a dyn RobotApi,
    config: &'a RunConfig,
    diagnostics: &'a dyn DiagnosticSink,
    cancel: CancelSignal,
}

impl<'a> CalibrationOrchestrator<'a> {
    pub fn new(
        robot: &'a dyn RobotApi,
        config: &'a RunConfig,
        diagnostics: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            robot,
            config,
            diagnostics,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the full sequence. Any error aborts the remaining steps.
    pub async fn run(&self) -> Result<WorkflowReport, CalibrationError> {
        let mut report = WorkflowReport {
            completed: Vec::new(),
            progress: Vec::new(),
            calibration: CalibrationProgress::from_response(&ApiResponse::Null),
            polls: 0,
            overridden_polls: 0,
            joints_overridden: false,
            calibrated_joints: Vec::new(),
            final_joints: Vec::new(),
        };

        match self.run_steps(&mut report).await {
            Ok(()) => Ok(report),
            Err(err) => {
                ui::step_err(&err.to_string());
                Err(err)
            }
        }
    }

    async fn run_steps(&self, report: &mut WorkflowReport) -> Result<(), CalibrationError> {
        ui::step(WorkflowStep::InitPose.label());
        self.acknowledge(&RobotCommand::InitPose, false).await?;
        report.completed.push(WorkflowStep::InitPose);

        self.checkpoint()?;
        ui::step(WorkflowStep::TorqueOff.label());
        self.acknowledge(&RobotCommand::SetTorque(false), false)
            .await?;
        report.completed.push(WorkflowStep::TorqueOff);

        self.checkpoint()?;
        ui::step(WorkflowStep::Calibrate.label());
        let poller = CalibrationPoller::new(
            self.robot,
            &self.config.poll,
            self.diagnostics,
            self.config.force,
        )
        .with_cancel(self.cancel.clone());
        let progress = &mut report.progress;
        let outcome = poller
            .run(|event| match event {
                PollEvent::Progress(p) => {
                    ui::calibration_progress(p);
                    progress.push(p.clone());
                }
                PollEvent::Overridden { phase, poisoned } => ui::step_warn(&format!(
                    "{phase}: ignoring poisoned values at {} (force)",
                    poisoned.join(", ")
                )),
                PollEvent::TotalStepsDecreased { previous, observed } => ui::step_warn(&format!(
                    "total steps went from {previous} to {observed}"
                )),
            })
            .await?;
        ui::step_ok(&format!(
            "calibrated in {} poll(s), {:.1}s",
            outcome.polls,
            outcome.elapsed.as_secs_f64()
        ));
        report.calibration = outcome.progress;
        report.polls = outcome.polls;
        report.overridden_polls = outcome.overridden;
        report.completed.push(WorkflowStep::Calibrate);

        self.checkpoint()?;
        ui::step(WorkflowStep::ValidateJoints.label());
        let joints = self.robot.send(&RobotCommand::ReadJoints).await?;
        let verdict = validate(&joints);
        if !verdict.is_valid() {
            self.diagnostics.persist(PHASE_JOINTS_READ, &joints);
            if !self.config.force {
                return Err(CalibrationError::PoisonedValue {
                    phase: PHASE_JOINTS_READ.to_string(),
                    poisoned: verdict.poisoned,
                    body: joints,
                });
            }
            log::warn!("joint read is invalid, re-enabling torque anyway because force is set");
            ui::step_warn(&format!(
                "poisoned joint values at {}; continuing (force)",
                verdict.poisoned.join(", ")
            ));
            report.joints_overridden = true;
        } else {
            ui::step_ok(&format_joints(&read_joints(&joints)));
        }
        report.calibrated_joints = read_joints(&joints);
        report.completed.push(WorkflowStep::ValidateJoints);

        self.checkpoint()?;
        ui::step(WorkflowStep::TorqueOn.label());
        self.acknowledge(&RobotCommand::SetTorque(true), true)
            .await?;
        report.completed.push(WorkflowStep::TorqueOn);

        self.checkpoint()?;
        ui::step(WorkflowStep::VerificationMove.label());
        self.acknowledge(&RobotCommand::MoveAbsolute(MoveTarget::verification()), true)
            .await?;
        report.completed.push(WorkflowStep::VerificationMove);

        self.checkpoint()?;
        ui::step(WorkflowStep::ReadJointsFinal.label());
        let final_read = self.robot.send(&RobotCommand::ReadJoints).await?;
        report.final_joints = read_joints(&final_read);
        ui::kv_preview("joints", &final_read.to_string());
        report.completed.push(WorkflowStep::ReadJointsFinal);

        Ok(())
    }

    fn checkpoint(&self) -> Result<(), CalibrationError> {
        if self.cancel.is_cancelled() {
            return Err(CalibrationError::Cancelled);
        }
        Ok(())
    }

    /// Send a command whose body only carries `status`/`message`.
    ///
    /// A non-ok status is a warning unless `required` is set, in which case
    /// it ends the run.
    async fn acknowledge(
        &self,
        command: &RobotCommand,
        required: bool,
    ) -> Result<ApiResponse, CalibrationError> {
        let body = self.robot.send(command).await?;
        let status: String = read_field(&body, "status", String::new());
        let message: String = read_field(&body, "message", String::new());
        if matches!(status.as_str(), "" | "ok" | "success") {
            ui::step_ok(&message);
        } else if required {
            return Err(CalibrationError::TerminalErrorStatus {
                status,
                message,
                body,
            });
        } else {
            log::warn!("{} answered status '{status}'", command.endpoint());
            ui::step_warn(&format!("status '{status}': {message}"));
        }
        Ok(body)
    }
}

fn format_joints(joints: &[f64]) -> String {
    let parts: Vec<String> = joints.iter().map(|j| format!("{j:.3}")).collect();
    format!("[{}] rad", parts.join(", "))
}
