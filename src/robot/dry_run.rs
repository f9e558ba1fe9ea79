use super::simulated::SimulatedRobot;
use super::{RobotApi, RobotCommand};
use crate::errors::CalibrationError;
use crate::response::ApiResponse;
use crate::ui;

/// Prints each request it would send, then answers with simulated bodies.
pub struct DryRunRobot {
    base_url: String,
    robot_id: u32,
    canned: SimulatedRobot,
}

impl DryRunRobot {
    pub fn new(base_url: impl Into<String>, robot_id: u32) -> Self {
        Self {
            base_url: base_url.into(),
            robot_id,
            canned: SimulatedRobot::new(),
        }
    }

    pub fn describe(&self, command: &RobotCommand) -> String {
        let url = format!(
            "{}{}?robot_id={}",
            self.base_url,
            command.endpoint(),
            self.robot_id
        );
        match command.body() {
            Some(body) => format!("POST {url} {body}"),
            None => format!("POST {url}"),
        }
    }

    pub fn calls(&self) -> Vec<RobotCommand> {
        self.canned.calls()
    }
}

#[async_trait::async_trait]
impl RobotApi for DryRunRobot {
    async fn send(&self, command: &RobotCommand) -> Result<ApiResponse, CalibrationError> {
        ui::dry_run_request(&self.describe(command));
        self.canned.send(command).await
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
