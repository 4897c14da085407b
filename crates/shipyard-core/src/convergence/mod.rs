//! Stack convergence: drive the control plane to the declared topology.
//!
//! The engine is an idempotent create-or-update protocol:
//!
//! | observed state            | action                                   |
//! |---------------------------|------------------------------------------|
//! | absent                    | create, then poll                        |
//! | complete or rolled back   | update; "no changes" ends without polling|
//! | anything else             | `StackBusy`, nothing submitted           |
//!
//! ## Known limitation
//!
//! The busy check is check-then-act. The control plane offers no lease, so a
//! second orchestrator starting between the describe and the submit can still
//! race this one; the control plane then rejects one of the two submissions.

mod stack;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::control_plane::{
    ControlPlane, ControlPlaneError, StackDescription, StackRequest, UpdateSubmission,
};
use crate::error::{DeployError, Result};
use crate::policy::{RetryPolicy, Sleeper};
use crate::types::{ParameterSet, StackState};

pub use stack::{ConvergedStack, OUTPUT_CLUSTER, OUTPUT_ENTRY_POINT, OUTPUT_NETWORK, StackOutputs};

/// The opaque template plus what submitting it requires.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    pub path: PathBuf,
    pub capabilities: Vec<String>,
    pub required_parameters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceOutcome {
    Created,
    Updated,
    /// The stack already matched; nothing was mutated.
    NoChanges,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConvergenceReport {
    pub outcome: ConvergenceOutcome,
    pub stack: ConvergedStack,
    /// Number of state observations made after submitting.
    pub polls: u32,
}

pub struct StackConvergence<'a> {
    control_plane: &'a dyn ControlPlane,
    sleeper: &'a dyn Sleeper,
    template: TemplateSpec,
    policy: RetryPolicy,
}

impl<'a> StackConvergence<'a> {
    pub fn new(
        control_plane: &'a dyn ControlPlane,
        sleeper: &'a dyn Sleeper,
        template: TemplateSpec,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            control_plane,
            sleeper,
            template,
            policy,
        }
    }

    /// Converge `stack_name` to the template with `parameters`.
    pub fn converge(&self, stack_name: &str, parameters: &ParameterSet) -> Result<ConvergenceReport> {
        self.validate(stack_name, parameters)?;

        let current = self.control_plane.describe_stack(stack_name)?;
        debug!(stack = stack_name, state = %current.state, status = %current.status, "observed stack");

        let request = StackRequest {
            stack_name,
            template: &self.template.path,
            parameters,
            capabilities: &self.template.capabilities,
        };

        match current.state {
            StackState::Absent => {
                info!(stack = stack_name, "stack absent; submitting create");
                self.control_plane
                    .create_stack(&request)
                    .map_err(|e| submission_failure(stack_name, StackState::Absent, e))?;
                let (description, polls) = self.wait_for_terminal(stack_name, StackState::Creating)?;
                Ok(ConvergenceReport {
                    outcome: ConvergenceOutcome::Created,
                    stack: ConvergedStack::from_description(stack_name, description)?,
                    polls,
                })
            }
            state if !state.accepts_update() => {
                debug!(stack = stack_name, status = %current.status, "stack not settled; refusing");
                Err(DeployError::StackBusy {
                    stack: stack_name.to_string(),
                    state,
                })
            }
            state => {
                info!(stack = stack_name, %state, "stack present; submitting update");
                let submission = self
                    .control_plane
                    .update_stack(&request)
                    .map_err(|e| submission_failure(stack_name, state, e))?;
                match submission {
                    UpdateSubmission::NoChanges => {
                        info!(stack = stack_name, "no changes to apply");
                        let description = StackDescription {
                            state: StackState::NoUpdateNeeded,
                            ..current
                        };
                        Ok(ConvergenceReport {
                            outcome: ConvergenceOutcome::NoChanges,
                            stack: ConvergedStack::from_description(stack_name, description)?,
                            polls: 0,
                        })
                    }
                    UpdateSubmission::Submitted { stack_id } => {
                        debug!(stack = stack_name, stack_id = %stack_id, "update accepted");
                        let (description, polls) =
                            self.wait_for_terminal(stack_name, StackState::Updating)?;
                        Ok(ConvergenceReport {
                            outcome: ConvergenceOutcome::Updated,
                            stack: ConvergedStack::from_description(stack_name, description)?,
                            polls,
                        })
                    }
                }
            }
        }
    }

    /// Read the stack without mutating it. Only a complete stack resolves.
    pub fn resolve_existing(&self, stack_name: &str) -> Result<ConvergedStack> {
        let current = self.control_plane.describe_stack(stack_name)?;
        match current.state {
            StackState::Absent => Err(DeployError::ConvergenceFailure {
                stack: stack_name.to_string(),
                state: StackState::Absent,
                reason: "stack does not exist; run the infrastructure stage first".to_string(),
            }),
            state if state.is_complete() => ConvergedStack::from_description(stack_name, current),
            state => Err(DeployError::StackBusy {
                stack: stack_name.to_string(),
                state,
            }),
        }
    }

    /// Current description, whatever the state. Used for reporting only.
    pub fn observe(&self, stack_name: &str) -> Result<StackDescription> {
        Ok(self.control_plane.describe_stack(stack_name)?)
    }

    fn validate(&self, stack_name: &str, parameters: &ParameterSet) -> Result<()> {
        let required = self.template.required_parameters.iter().map(String::as_str);
        if let Some(name) = parameters.first_missing(required) {
            return Err(DeployError::MissingParameter {
                name: name.to_string(),
            });
        }
        if self.template.capabilities.is_empty() {
            return Err(DeployError::MissingCapability {
                stack: stack_name.to_string(),
            });
        }
        Ok(())
    }

    fn wait_for_terminal(
        &self,
        stack_name: &str,
        submitted: StackState,
    ) -> Result<(StackDescription, u32)> {
        let mut last = submitted;
        for attempt in 1..=self.policy.max_attempts {
            self.sleeper.sleep(self.policy.interval);
            let description = self.control_plane.describe_stack(stack_name)?;
            debug!(
                stack = stack_name,
                attempt,
                state = %description.state,
                "polled stack"
            );

            if description.state.is_complete() {
                info!(stack = stack_name, state = %description.state, polls = attempt, "stack converged");
                return Ok((description, attempt));
            }
            if description.state.is_failed() || description.state == StackState::Absent {
                return Err(DeployError::ConvergenceFailure {
                    stack: stack_name.to_string(),
                    state: description.state,
                    reason: description
                        .status_reason
                        .unwrap_or(description.status),
                });
            }
            last = description.state;
        }

        Err(DeployError::ConvergenceTimeout {
            stack: stack_name.to_string(),
            state: last,
            attempts: self.policy.max_attempts,
        })
    }
}

fn submission_failure(stack: &str, state: StackState, err: ControlPlaneError) -> DeployError {
    DeployError::ConvergenceFailure {
        stack: stack.to_string(),
        state,
        reason: err.to_string(),
    }
}
