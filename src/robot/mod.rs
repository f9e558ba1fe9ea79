use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub mod dry_run;
pub mod http;
pub mod simulated;

use crate::config::{RunConfig, RunMode};
use crate::errors::CalibrationError;
use crate::response::ApiResponse;

/// Cartesian target for `/move/absolute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub open: f64,
    pub max_trials: u32,
}

impl MoveTarget {
    /// Small displacement used to check the arm responds after calibration.
    pub fn verification() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 2.0,
            open: 0.0,
            max_trials: 10,
        }
    }
}

/// One request against the robot-control service. All are `POST ?robot_id=`.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    InitPose,
    SetTorque(bool),
    Calibrate,
    ReadJoints,
    MoveAbsolute(MoveTarget),
}

impl RobotCommand {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::InitPose => "/move/init",
            Self::SetTorque(_) => "/torque/toggle",
            Self::Calibrate => "/calibrate",
            Self::ReadJoints => "/joints/read",
            Self::MoveAbsolute(_) => "/move/absolute",
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            Self::InitPose | Self::Calibrate => None,
            Self::SetTorque(enabled) => Some(json!({ "torque_status": enabled })),
            Self::ReadJoints => Some(json!({ "unit": "rad", "source": "robot" })),
            Self::MoveAbsolute(target) => Some(json!(target)),
        }
    }
}

/// Transport to the robot-control service.
#[async_trait::async_trait]
pub trait RobotApi: Send + Sync {
    /// Issue one command and return its parsed body.
    async fn send(&self, command: &RobotCommand) -> Result<ApiResponse, CalibrationError>;

    /// Short transport name for the operator header
    fn name(&self) -> &str;
}

/// Build the transport the run mode asks for.
pub fn create_robot(config: &RunConfig) -> Result<Box<dyn RobotApi>, CalibrationError> {
    match config.mode {
        RunMode::Live => Ok(Box::new(http::HttpRobot::new(
            config.base_url(),
            config.robot_id,
            config.request_timeout,
            config.retries,
        )?)),
        RunMode::Simulate => Ok(Box::new(simulated::SimulatedRobot::new())),
        RunMode::DryRun => Ok(Box::new(dry_run::DryRunRobot::new(
            config.base_url(),
            config.robot_id,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bodies_match_service_schema() {
        assert_eq!(RobotCommand::InitPose.body(), None);
        assert_eq!(
            RobotCommand::SetTorque(false).body(),
            Some(json!({"torque_status": false}))
        );
        assert_eq!(
            RobotCommand::ReadJoints.body(),
            Some(json!({"unit": "rad", "source": "robot"}))
        );
        let body = RobotCommand::MoveAbsolute(MoveTarget::verification())
            .body()
            .unwrap();
        for key in ["x", "y", "z", "open", "max_trials"] {
            assert!(body.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn factory_follows_mode() {
        let mut config = RunConfig {
            mode: RunMode::Simulate,
            ..Default::default()
        };
        assert_eq!(create_robot(&config).unwrap().name(), "simulated");
        config.mode = RunMode::DryRun;
        assert_eq!(create_robot(&config).unwrap().name(), "dry-run");
        config.mode = RunMode::Live;
        assert_eq!(create_robot(&config).unwrap().name(), "http");
    }
}
