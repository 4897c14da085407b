//! Resolved, explicit settings handed to every stage at construction time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::env::EnvOverrides;
use super::schema::ShipyardConfig;
use crate::policy::RetryPolicy;
use crate::types::{Component, DeploymentConstraints, DeploymentTarget, ImageReference, ParameterSet};

const DEFAULT_REGION: &str = "us-east-1";

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub environment: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub prefix: String,
    pub tag: String,
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub backend_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub platform: String,
}

impl BuildSettings {
    pub fn source_dir(&self, component: Component) -> &Path {
        match component {
            Component::Backend => &self.backend_dir,
            Component::Frontend => &self.frontend_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutSettings {
    pub constraints: DeploymentConstraints,
    pub desired_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSettings {
    pub paths: Vec<String>,
    pub policy: RetryPolicy,
    pub request_timeout: Duration,
    pub scheme: String,
}

#[derive(Clone)]
pub struct DeploySettings {
    pub target: DeploymentTarget,
    pub profile: Option<String>,
    pub template: PathBuf,
    pub capabilities: Vec<String>,
    pub required_parameters: Vec<String>,
    pub registry: RegistrySettings,
    pub database_password: Option<String>,
    pub build: BuildSettings,
    pub convergence: RetryPolicy,
    pub rollout: RolloutSettings,
    pub health: HealthSettings,
}

impl DeploySettings {
    /// Merge file config, environment and command-line values.
    ///
    /// Precedence: command line > environment > file > built-in default.
    /// Relative paths are anchored at `project_root`.
    pub fn resolve(
        config: &ShipyardConfig,
        env: &EnvOverrides,
        overrides: &SettingsOverrides,
        project_root: &Path,
    ) -> Self {
        let environment = overrides
            .environment
            .clone()
            .or_else(|| env.environment.clone())
            .unwrap_or_else(|| config.target.environment.clone());
        let region = overrides
            .region
            .clone()
            .or_else(|| env.region.clone())
            .or_else(|| config.target.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let stack_name = config
            .target
            .stack_name
            .replace("{environment}", &environment);

        Self {
            target: DeploymentTarget::new(environment, region, stack_name),
            profile: config.target.profile.clone(),
            template: project_root.join(&config.template.path),
            capabilities: config.template.capabilities.clone(),
            required_parameters: config.template.required_parameters.clone(),
            registry: RegistrySettings {
                prefix: env
                    .registry_prefix
                    .clone()
                    .unwrap_or_else(|| config.registry.prefix.clone()),
                tag: config.registry.tag.clone(),
                account_id: env
                    .account_id
                    .clone()
                    .or_else(|| config.registry.account_id.clone()),
            },
            database_password: env.database_password.clone(),
            build: BuildSettings {
                backend_dir: project_root.join(&config.build.backend_dir),
                frontend_dir: project_root.join(&config.build.frontend_dir),
                platform: config.build.platform.clone(),
            },
            convergence: RetryPolicy::new(
                Duration::from_secs(config.convergence.poll_interval_secs),
                config.convergence.max_attempts,
            ),
            rollout: RolloutSettings {
                constraints: DeploymentConstraints {
                    max_percent: config.rollout.max_percent,
                    min_healthy_percent: config.rollout.min_healthy_percent,
                },
                desired_count: config.rollout.desired_count,
            },
            health: HealthSettings {
                paths: config.health.paths.clone(),
                policy: RetryPolicy::new(
                    Duration::from_secs(config.health.interval_secs),
                    config.health.attempts,
                ),
                request_timeout: Duration::from_secs(config.health.request_timeout_secs),
                scheme: config.health.scheme.clone(),
            },
        }
    }

    pub fn registry_host(&self, account_id: &str) -> String {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com",
            account_id, self.target.region
        )
    }

    /// Deterministic image name: `<host>/<prefix>/<component>:<tag>`.
    pub fn image_reference(&self, component: Component, account_id: &str) -> ImageReference {
        ImageReference::new(
            format!(
                "{}/{}/{}",
                self.registry_host(account_id),
                self.registry.prefix,
                component
            ),
            self.registry.tag.clone(),
        )
    }

    /// Template parameters for the given images.
    ///
    /// The database password is left out when unset, so convergence reports
    /// it as a missing parameter instead of submitting an empty value.
    pub fn parameters(&self, images: &[(Component, ImageReference)]) -> ParameterSet {
        let mut params = ParameterSet::new().with("Environment", &self.target.environment);
        if let Some(password) = &self.database_password {
            params.insert_secret("DatabasePassword", password);
        }
        for (component, image) in images {
            params.insert(component.repository_parameter(), &image.repository);
        }
        params
    }
}

impl std::fmt::Debug for DeploySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploySettings")
            .field("target", &self.target)
            .field("template", &self.template)
            .field("capabilities", &self.capabilities)
            .field("registry", &self.registry)
            .field(
                "database_password",
                &self.database_password.as_ref().map(|_| "<redacted>"),
            )
            .field("convergence", &self.convergence)
            .field("rollout", &self.rollout)
            .field("health", &self.health)
            .finish()
    }
}
