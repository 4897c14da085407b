//! Error taxonomy for deployment runs.
//!
//! Every stage fails with a [`DeployError`]. Health problems are not errors:
//! they travel in the report as [`crate::outcome::Outcome::Warning`].

use thiserror::Error;

use crate::control_plane::ControlPlaneError;
use crate::types::{Component, StackState};

pub type Result<T> = std::result::Result<T, DeployError>;

/// A service whose replacement request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedService {
    pub service: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("missing prerequisite: {what}")]
    MissingPrerequisite { what: String },

    #[error("template parameter '{name}' is required but was not supplied")]
    MissingParameter { name: String },

    #[error("stack '{stack}' requires an explicit capability declaration (e.g. CAPABILITY_IAM)")]
    MissingCapability { stack: String },

    #[error("building {component} image failed: {reason}")]
    BuildFailure { component: Component, reason: String },

    #[error("publishing {image} failed: {reason}")]
    PublishFailure { image: String, reason: String },

    #[error("stack '{stack}' is busy ({state}); refusing to start a concurrent convergence")]
    StackBusy { stack: String, state: StackState },

    #[error("stack '{stack}' did not converge (last state: {state}): {reason}")]
    ConvergenceFailure {
        stack: String,
        state: StackState,
        reason: String,
    },

    #[error("stack '{stack}' did not reach a terminal state after {attempts} polls (last state: {state})")]
    ConvergenceTimeout {
        stack: String,
        state: StackState,
        attempts: u32,
    },

    #[error("{}", rollout_message(.rejected, .accepted))]
    RolloutFailure {
        rejected: Vec<RejectedService>,
        accepted: Vec<String>,
    },

    #[error("stack '{stack}' is missing output '{output}'")]
    MissingOutput { stack: String, output: String },

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DeployError {
    /// Short machine-friendly class name used in user-facing messages.
    pub fn class(&self) -> &'static str {
        match self {
            DeployError::MissingPrerequisite { .. } => "missing-prerequisite",
            DeployError::MissingParameter { .. } => "missing-parameter",
            DeployError::MissingCapability { .. } => "missing-capability",
            DeployError::BuildFailure { .. } => "build-failure",
            DeployError::PublishFailure { .. } => "publish-failure",
            DeployError::StackBusy { .. } => "stack-busy",
            DeployError::ConvergenceFailure { .. } => "convergence-failure",
            DeployError::ConvergenceTimeout { .. } => "convergence-timeout",
            DeployError::RolloutFailure { .. } => "rollout-failure",
            DeployError::MissingOutput { .. } => "missing-output",
            DeployError::ControlPlane(_) => "control-plane",
            DeployError::Config(_) => "config",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::MissingPrerequisite { .. } => 2,
            _ => 1,
        }
    }

    /// True when a rollout failed for some services but was accepted for others.
    pub fn is_partial_rollout(&self) -> bool {
        matches!(
            self,
            DeployError::RolloutFailure { rejected, accepted }
                if !rejected.is_empty() && !accepted.is_empty()
        )
    }
}

fn rollout_message(rejected: &[RejectedService], accepted: &[String]) -> String {
    let names: Vec<String> = rejected
        .iter()
        .map(|r| format!("{} ({})", r.service, r.reason))
        .collect();
    let total = rejected.len() + accepted.len();
    if accepted.is_empty() {
        format!("rollout rejected for every service: {}", names.join(", "))
    } else {
        format!(
            "partial rollout: {} of {} services accepted; rejected: {}",
            accepted.len(),
            total,
            names.join(", ")
        )
    }
}
