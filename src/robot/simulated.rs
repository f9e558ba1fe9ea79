//! Canned robot-control responses, for exercising the workflow without hardware.
//!
//! Each endpoint answers from a script; once a script is down to its last entry that
//! entry repeats. Every command is recorded so callers can assert on call order.

use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{RobotApi, RobotCommand};
use crate::errors::CalibrationError;
use crate::response::ApiResponse;

pub fn canned_calibration() -> Value {
    json!({
        "calibration_status": "success",
        "total_nb_steps": 10,
        "current_step": 10,
        "message": "simulated"
    })
}

pub fn canned_joints() -> Value {
    json!({ "joints": [0.0, 0.1, 0.2, 0.3, 0.4, 0.5] })
}

pub fn canned_ack() -> Value {
    json!({ "status": "ok", "message": "simulated" })
}

/// Scripted entry: a body, or a transport failure with the given reason.
#[derive(Debug, Clone)]
enum Scripted {
    Body(Value),
    TransportFailure(String),
}

pub struct SimulatedRobot {
    scripts: Mutex<HashMap<&'static str, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RobotCommand>>,
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRobot {
    pub fn new() -> Self {
        let mut scripts = HashMap::new();
        for (endpoint, body) in [
            ("/move/init", canned_ack()),
            ("/torque/toggle", canned_ack()),
            ("/calibrate", canned_calibration()),
            ("/joints/read", canned_joints()),
            ("/move/absolute", canned_ack()),
        ] {
            scripts.insert(endpoint, VecDeque::from([Scripted::Body(body)]));
        }
        Self {
            scripts: Mutex::new(scripts),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the script for `endpoint` with `bodies`, answered in order.
    pub fn with_script(self, endpoint: &'static str, bodies: Vec<Value>) -> Self {
        self.set_script(endpoint, bodies.into_iter().map(Scripted::Body).collect());
        self
    }

    pub fn with_calibration_sequence(self, bodies: Vec<Value>) -> Self {
        self.with_script("/calibrate", bodies)
    }

    pub fn with_joint_reads(self, bodies: Vec<Value>) -> Self {
        self.with_script("/joints/read", bodies)
    }

    /// Make every call to `endpoint` fail as if the connection broke.
    pub fn with_transport_failure(self, endpoint: &'static str, reason: &str) -> Self {
        self.set_script(
            endpoint,
            VecDeque::from([Scripted::TransportFailure(reason.to_string())]),
        );
        self
    }

    fn set_script(&self, endpoint: &'static str, script: VecDeque<Scripted>) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(endpoint, script);
    }

    /// Commands received so far, in order.
    pub fn calls(&self) -> Vec<RobotCommand> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.endpoint() == endpoint)
            .count()
    }

    fn next_for(&self, endpoint: &'static str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let script = scripts.get_mut(endpoint)?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait::async_trait]
impl RobotApi for SimulatedRobot {
    async fn send(&self, command: &RobotCommand) -> Result<ApiResponse, CalibrationError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());

        let endpoint = command.endpoint();
        match self.next_for(endpoint) {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::TransportFailure(reason)) => {
                Err(CalibrationError::transport(endpoint, reason))
            }
            None => Err(CalibrationError::transport(endpoint, "no simulated response")),
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
