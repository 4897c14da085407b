//! Stage composition: Build -> Infrastructure -> Application -> Health.
//!
//! Stages run strictly in that order, each consuming what the previous one
//! produced. A failing stage aborts the rest; the health stage never fails,
//! it only attaches warnings.

pub mod info;

use serde::Serialize;
use tracing::info;

use crate::build::{ArtifactBuilder, BuiltImage, ImageTool};
use crate::config::DeploySettings;
use crate::control_plane::ControlPlane;
use crate::convergence::{ConvergedStack, ConvergenceReport, StackConvergence, TemplateSpec};
use crate::error::{DeployError, Result};
use crate::health::{HealthReport, HealthVerifier, HttpProbe};
use crate::outcome::Outcome;
use crate::policy::Sleeper;
use crate::rollout::{RolloutDriver, RolloutReport};
use crate::types::{Component, DeploymentTarget, ImageReference};

pub use info::InfoReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Infrastructure,
    Application,
    Health,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Build,
        Stage::Infrastructure,
        Stage::Application,
        Stage::Health,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Build => "build",
            Stage::Infrastructure => "infrastructure",
            Stage::Application => "application",
            Stage::Health => "health",
        };
        f.write_str(name)
    }
}

/// What a run did, stage by stage.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub target: DeploymentTarget,
    pub stages: Vec<Stage>,
    pub built: Vec<BuiltImage>,
    pub convergence: Option<ConvergenceReport>,
    pub rollout: Option<RolloutReport>,
    pub health: Option<HealthReport>,
}

impl PipelineReport {
    /// Success, or a warning when advisory health checks failed.
    pub fn outcome(&self) -> Outcome {
        match &self.health {
            Some(health) => health.outcome(),
            None => Outcome::Success,
        }
    }

    /// Public URL of the application, when the stack was resolved.
    pub fn application_url(&self, scheme: &str) -> Option<String> {
        self.convergence
            .as_ref()
            .map(|c| format!("{}://{}", scheme, c.stack.outputs().entry_point))
    }
}

/// Collaborators a pipeline drives. Production code wires the aws/docker
/// CLIs and a reqwest probe; tests wire doubles.
pub struct Pipeline<'a> {
    settings: &'a DeploySettings,
    control_plane: &'a dyn ControlPlane,
    image_tool: &'a dyn ImageTool,
    probe: &'a dyn HttpProbe,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a DeploySettings,
        control_plane: &'a dyn ControlPlane,
        image_tool: &'a dyn ImageTool,
        probe: &'a dyn HttpProbe,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            settings,
            control_plane,
            image_tool,
            probe,
            sleeper,
        }
    }

    pub fn settings(&self) -> &DeploySettings {
        self.settings
    }

    /// Run the requested stages in pipeline order.
    pub fn run(&self, stages: &[Stage]) -> Result<PipelineReport> {
        let mut ordered: Vec<Stage> = stages.to_vec();
        ordered.sort();
        ordered.dedup();

        let target = &self.settings.target;
        info!(
            environment = %target.environment,
            region = %target.region,
            stack = %target.stack_name,
            stages = ?ordered,
            "starting run"
        );

        let mut report = PipelineReport {
            target: target.clone(),
            stages: ordered.clone(),
            built: Vec::new(),
            convergence: None,
            rollout: None,
            health: None,
        };

        let needs_images = ordered
            .iter()
            .any(|s| matches!(s, Stage::Build | Stage::Infrastructure));
        let images = if needs_images {
            self.image_references()?
        } else {
            Vec::new()
        };

        if ordered.contains(&Stage::Build) {
            info!("stage: build");
            let builder =
                ArtifactBuilder::new(self.image_tool, self.control_plane, self.settings.build.clone());
            report.built = builder.build_and_publish(&images)?;
        }

        let convergence = self.convergence();
        let mut stack: Option<ConvergedStack> = None;

        if ordered.contains(&Stage::Infrastructure) {
            info!("stage: infrastructure");
            let parameters = self.settings.parameters(&images);
            let converged = convergence.converge(&target.stack_name, &parameters)?;
            stack = Some(converged.stack.clone());
            report.convergence = Some(converged);
        }

        if ordered.contains(&Stage::Application) {
            info!("stage: application");
            let resolved = self.resolved_stack(&convergence, stack.take())?;
            let driver = RolloutDriver::new(self.control_plane, self.settings.rollout.clone());
            report.rollout = Some(driver.roll_out(&resolved)?);
            stack = Some(resolved);
        }

        if ordered.contains(&Stage::Health) {
            info!("stage: health");
            let resolved = self.resolved_stack(&convergence, stack.take())?;
            let verifier = HealthVerifier::new(self.probe, self.sleeper, self.settings.health.clone());
            report.health = Some(verifier.verify(&resolved.outputs().entry_point));
        }

        Ok(report)
    }

    /// Deterministic image names for every component.
    pub fn image_references(&self) -> Result<Vec<(Component, ImageReference)>> {
        let account = self.account_id()?;
        Ok(Component::ALL
            .iter()
            .map(|&c| (c, self.settings.image_reference(c, &account)))
            .collect())
    }

    /// Configured account id, or the caller identity's.
    pub fn account_id(&self) -> Result<String> {
        if let Some(account) = &self.settings.registry.account_id {
            return Ok(account.clone());
        }
        let account = self
            .control_plane
            .caller_account()
            .map_err(|e| DeployError::MissingPrerequisite {
                what: format!(
                    "AWS account id could not be resolved (set AWS_ACCOUNT_ID or configure credentials): {}",
                    e
                ),
            })?;
        info!(account = %account, "resolved account from caller identity");
        Ok(account)
    }

    fn convergence(&self) -> StackConvergence<'a> {
        StackConvergence::new(
            self.control_plane,
            self.sleeper,
            TemplateSpec {
                path: self.settings.template.clone(),
                capabilities: self.settings.capabilities.clone(),
                required_parameters: self.settings.required_parameters.clone(),
            },
            self.settings.convergence,
        )
    }

    fn resolved_stack(
        &self,
        convergence: &StackConvergence<'_>,
        known: Option<ConvergedStack>,
    ) -> Result<ConvergedStack> {
        match known {
            Some(stack) => Ok(stack),
            None => convergence.resolve_existing(&self.settings.target.stack_name),
        }
    }
}
