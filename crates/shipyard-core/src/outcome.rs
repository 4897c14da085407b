//! Overall result of a deployment invocation.
//!
//! Hard failures (prerequisites, convergence, rollout) and advisory warnings
//! (health checks) stay distinct all the way to the exit code.

use serde::Serialize;

use crate::error::DeployError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    /// Administrative success with advisory problems attached.
    Warning { warnings: Vec<String> },
    Failure {
        class: String,
        message: String,
        exit_code: i32,
    },
}

impl Outcome {
    pub fn from_warnings(warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Outcome::Success
        } else {
            Outcome::Warning { warnings }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success | Outcome::Warning { .. } => 0,
            Outcome::Failure { exit_code, .. } => *exit_code,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }
}

impl From<&DeployError> for Outcome {
    fn from(err: &DeployError) -> Self {
        Outcome::Failure {
            class: err.class().to_string(),
            message: err.to_string(),
            exit_code: err.exit_code(),
        }
    }
}
