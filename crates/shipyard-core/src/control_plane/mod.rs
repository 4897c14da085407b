//! Control-plane client seam.
//!
//! The orchestrator talks to the cloud control plane (stacks, services,
//! registry auth, identity) only through [`ControlPlane`]. The production
//! implementation shells out to the `aws` CLI; tests use in-memory doubles.

pub mod aws_cli;

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::types::{ParameterSet, ServiceDescriptor, StackState};

pub use aws_cli::AwsCli;

/// Errors returned by a control-plane client.
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("failed to invoke {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} was rejected: {message}")]
    Rejected { operation: String, message: String },

    #[error("unexpected response from {operation}: {reason}")]
    Malformed { operation: String, reason: String },
}

impl ControlPlaneError {
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        ControlPlaneError::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn malformed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        ControlPlaneError::Malformed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// What the control plane currently reports for a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub state: StackState,
    /// Raw vendor status (e.g. `UPDATE_ROLLBACK_COMPLETE`), for diagnostics.
    pub status: String,
    pub status_reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

impl StackDescription {
    pub fn absent() -> Self {
        Self {
            state: StackState::Absent,
            status: "DOES_NOT_EXIST".to_string(),
            status_reason: None,
            outputs: BTreeMap::new(),
        }
    }
}

/// Everything a create or update submission carries.
#[derive(Debug, Clone)]
pub struct StackRequest<'a> {
    pub stack_name: &'a str,
    pub template: &'a Path,
    pub parameters: &'a ParameterSet,
    pub capabilities: &'a [String],
}

/// Answer to an update submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSubmission {
    /// The control plane accepted the update and started converging.
    Submitted { stack_id: String },
    /// The stack already matches the template and parameters.
    NoChanges,
}

/// Answer to a service replacement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpdateAck {
    pub deployment_id: Option<String>,
}

pub trait ControlPlane {
    /// Current state and outputs of a stack; `StackState::Absent` when it does not exist.
    fn describe_stack(&self, stack_name: &str) -> Result<StackDescription, ControlPlaneError>;

    /// Submit a create request. Returns the new stack id.
    fn create_stack(&self, request: &StackRequest<'_>) -> Result<String, ControlPlaneError>;

    fn update_stack(
        &self,
        request: &StackRequest<'_>,
    ) -> Result<UpdateSubmission, ControlPlaneError>;

    /// Ask the service to replace its tasks. Returns once the request is accepted.
    fn update_service(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<ServiceUpdateAck, ControlPlaneError>;

    /// Account id of the current credentials.
    fn caller_account(&self) -> Result<String, ControlPlaneError>;

    /// Short-lived registry password for `docker login`.
    fn registry_password(&self) -> Result<String, ControlPlaneError>;

    /// Create the registry repository if it does not exist yet.
    fn ensure_repository(&self, repository_name: &str) -> Result<(), ControlPlaneError>;
}
