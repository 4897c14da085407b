//! A stack known to be in a complete state, and its named outputs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::RolloutSettings;
use crate::control_plane::StackDescription;
use crate::error::{DeployError, Result};
use crate::types::{Component, ServiceDescriptor, StackState};

pub const OUTPUT_NETWORK: &str = "VPCId";
pub const OUTPUT_CLUSTER: &str = "ClusterName";
pub const OUTPUT_ENTRY_POINT: &str = "ALBDNSName";

/// Named outputs of the topology template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackOutputs {
    pub network_id: Option<String>,
    pub cluster: String,
    pub backend_service: String,
    pub frontend_service: String,
    /// Public DNS name of the load balancer.
    pub entry_point: String,
}

impl StackOutputs {
    fn from_map(stack_name: &str, outputs: &BTreeMap<String, String>) -> Result<Self> {
        let require = |key: &str| {
            outputs
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| DeployError::MissingOutput {
                    stack: stack_name.to_string(),
                    output: key.to_string(),
                })
        };

        Ok(Self {
            network_id: outputs.get(OUTPUT_NETWORK).cloned(),
            cluster: require(OUTPUT_CLUSTER)?,
            backend_service: require(Component::Backend.service_output())?,
            frontend_service: require(Component::Frontend.service_output())?,
            entry_point: require(OUTPUT_ENTRY_POINT)?,
        })
    }

    pub fn service(&self, component: Component) -> &str {
        match component {
            Component::Backend => &self.backend_service,
            Component::Frontend => &self.frontend_service,
        }
    }
}

/// A stack observed in a `*-complete` state.
///
/// Only the convergence engine constructs this, so anything holding one
/// (notably the rollout driver) can rely on the stack being settled.
#[derive(Debug, Clone, Serialize)]
pub struct ConvergedStack {
    stack_name: String,
    state: StackState,
    outputs: StackOutputs,
    raw_outputs: BTreeMap<String, String>,
}

impl ConvergedStack {
    pub(crate) fn from_description(stack_name: &str, description: StackDescription) -> Result<Self> {
        if !description.state.is_complete() {
            return Err(DeployError::ConvergenceFailure {
                stack: stack_name.to_string(),
                state: description.state,
                reason: "stack is not in a complete state".to_string(),
            });
        }
        let outputs = StackOutputs::from_map(stack_name, &description.outputs)?;
        Ok(Self {
            stack_name: stack_name.to_string(),
            state: description.state,
            outputs,
            raw_outputs: description.outputs,
        })
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    pub fn outputs(&self) -> &StackOutputs {
        &self.outputs
    }

    /// One descriptor per component, backend first.
    pub fn service_descriptors(&self, rollout: &RolloutSettings) -> Vec<ServiceDescriptor> {
        Component::ALL
            .iter()
            .map(|&component| ServiceDescriptor {
                component,
                cluster: self.outputs.cluster.clone(),
                service: self.outputs.service(component).to_string(),
                desired_count: rollout.desired_count,
                constraints: rollout.constraints,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeploymentConstraints;

    fn description(state: StackState, outputs: &[(&str, &str)]) -> StackDescription {
        StackDescription {
            state,
            status: "TEST".to_string(),
            status_reason: None,
            outputs: outputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    const OUTPUTS: [(&str, &str); 4] = [
        ("ClusterName", "production-cluster"),
        ("BackendServiceName", "production-backend-svc"),
        ("FrontendServiceName", "production-frontend-svc"),
        ("ALBDNSName", "alb.example.com"),
    ];

    #[test]
    fn in_progress_stack_is_refused() {
        let err = ConvergedStack::from_description("s", description(StackState::Updating, &OUTPUTS))
            .unwrap_err();
        assert!(matches!(err, DeployError::ConvergenceFailure { .. }));
    }

    #[test]
    fn missing_output_is_named() {
        let err = ConvergedStack::from_description(
            "s",
            description(StackState::CreateComplete, &OUTPUTS[..3]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ALBDNSName"));
    }

    #[test]
    fn descriptors_carry_rollout_constraints() {
        let stack =
            ConvergedStack::from_description("s", description(StackState::UpdateComplete, &OUTPUTS))
                .unwrap();
        let rollout = RolloutSettings {
            constraints: DeploymentConstraints {
                max_percent: 150,
                min_healthy_percent: 100,
            },
            desired_count: Some(2),
        };

        let descriptors = stack.service_descriptors(&rollout);
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].service, "production-backend-svc");
        assert_eq!(descriptors[1].service, "production-frontend-svc");
        assert!(descriptors.iter().all(|d| d.cluster == "production-cluster"));
        assert_eq!(descriptors[0].constraints.min_healthy_percent, 100);
        assert_eq!(descriptors[1].desired_count, Some(2));
        assert_eq!(stack.outputs().network_id, None);
    }
}
