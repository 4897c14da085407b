//! Post-rollout health verification.
//!
//! Health results are advisory. A failing check produces a warning in the
//! report; it never turns a deploy into a failure.

mod probe;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HealthSettings;
use crate::outcome::Outcome;
use crate::policy::Sleeper;

pub use probe::{HttpProbe, ReqwestProbe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of polling one URL.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub url: String,
    pub status: HealthStatus,
    pub attempts: u32,
    pub last_status_code: Option<u16>,
    pub last_error: Option<String>,
}

impl HealthCheck {
    fn describe_failure(&self) -> String {
        match (&self.last_status_code, &self.last_error) {
            (_, Some(err)) => format!(
                "{} not healthy after {} attempts: {}",
                self.url, self.attempts, err
            ),
            (Some(code), None) => format!(
                "{} not healthy after {} attempts: HTTP {}",
                self.url, self.attempts, code
            ),
            (None, None) => format!("{} not healthy after {} attempts", self.url, self.attempts),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.status == HealthStatus::Healthy)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.status == HealthStatus::Unhealthy)
            .map(HealthCheck::describe_failure)
            .collect()
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_warnings(self.warnings())
    }
}

pub struct HealthVerifier<'a> {
    probe: &'a dyn HttpProbe,
    sleeper: &'a dyn Sleeper,
    settings: HealthSettings,
}

impl<'a> HealthVerifier<'a> {
    pub fn new(probe: &'a dyn HttpProbe, sleeper: &'a dyn Sleeper, settings: HealthSettings) -> Self {
        Self {
            probe,
            sleeper,
            settings,
        }
    }

    /// Poll every configured path on `entry_point` (a host name or host:port).
    pub fn verify(&self, entry_point: &str) -> HealthReport {
        debug!(
            entry_point,
            attempts = self.settings.policy.max_attempts,
            max_wait = ?self.settings.policy.max_wait(),
            "verifying health"
        );
        let checks = self
            .settings
            .paths
            .iter()
            .map(|path| self.check(entry_point, path))
            .collect();
        HealthReport { checks }
    }

    fn check(&self, entry_point: &str, path: &str) -> HealthCheck {
        let url = match health_url(&self.settings.scheme, entry_point, path) {
            Ok(url) => url,
            Err(err) => {
                return HealthCheck {
                    url: format!("{}://{}{}", self.settings.scheme, entry_point, path),
                    status: HealthStatus::Unhealthy,
                    attempts: 0,
                    last_status_code: None,
                    last_error: Some(err.to_string()),
                };
            }
        };

        let policy = self.settings.policy;
        let mut last_status_code = None;
        let mut last_error = None;

        for attempt in 1..=policy.max_attempts {
            match self.probe.get_status(url.as_str()) {
                Ok(code) if (200..300).contains(&code) => {
                    info!(url = %url, attempt, "healthy");
                    return HealthCheck {
                        url: url.to_string(),
                        status: HealthStatus::Healthy,
                        attempts: attempt,
                        last_status_code: Some(code),
                        last_error: None,
                    };
                }
                Ok(code) => {
                    debug!(url = %url, attempt, code, "not healthy yet");
                    last_status_code = Some(code);
                    last_error = None;
                }
                Err(err) => {
                    debug!(url = %url, attempt, error = %err, "probe failed");
                    last_error = Some(err.to_string());
                }
            }
            if attempt < policy.max_attempts {
                self.sleeper.sleep(policy.interval);
            }
        }

        warn!(url = %url, attempts = policy.max_attempts, "health check did not pass");
        HealthCheck {
            url: url.to_string(),
            status: HealthStatus::Unhealthy,
            attempts: policy.max_attempts,
            last_status_code,
            last_error,
        }
    }
}

fn health_url(scheme: &str, entry_point: &str, path: &str) -> anyhow::Result<Url> {
    let base = Url::parse(&format!("{}://{}", scheme, entry_point))?;
    Ok(base.join(path)?)
}
