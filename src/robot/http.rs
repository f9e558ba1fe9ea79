use reqwest::Client;
use std::time::Duration;

use super::{RobotApi, RobotCommand};
use crate::errors::CalibrationError;
use crate::response::{ApiResponse, parse_body};
use crate::sanitize;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

pub struct HttpRobot {
    client: Client,
    base_url: String,
    robot_id: u32,
    retries: u32,
}

impl HttpRobot {
    pub fn new(
        base_url: impl Into<String>,
        robot_id: u32,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, CalibrationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalibrationError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            robot_id,
            retries,
        })
    }

    pub fn url_for(&self, command: &RobotCommand) -> String {
        format!("{}{}", self.base_url, command.endpoint())
    }

    async fn send_once(&self, command: &RobotCommand) -> Result<String, CalibrationError> {
        let endpoint = command.endpoint();
        let mut request = self
            .client
            .post(self.url_for(command))
            .query(&[("robot_id", self.robot_id)]);
        if let Some(body) = command.body() {
            request = request.json(&body);
        }

        let res = request
            .send()
            .await
            .map_err(|e| CalibrationError::transport(endpoint, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| CalibrationError::transport(endpoint, e))?;

        if !status.is_success() {
            return Err(CalibrationError::transport(
                endpoint,
                format!("HTTP {status}: {}", sanitize::truncate_chars(&text, 512)),
            ));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl RobotApi for HttpRobot {
    async fn send(&self, command: &RobotCommand) -> Result<ApiResponse, CalibrationError> {
        let mut attempt = 0;
        let text = loop {
            match self.send_once(command).await {
                Ok(text) => break text,
                Err(err) if attempt < self.retries => {
                    let delay = backoff_delay(attempt);
                    log::warn!(
                        "{} failed ({err}); retry {}/{} in {delay:?}",
                        command.endpoint(),
                        attempt + 1,
                        self.retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        parse_body(command.endpoint(), &text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.saturating_pow(attempt.min(6))
}
