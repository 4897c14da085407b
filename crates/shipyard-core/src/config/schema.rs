//! Configuration schema for shipyard.toml
//!
//! Every section is optional; a missing file is equivalent to an empty one.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure for shipyard.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShipyardConfig {
    #[serde(default)]
    pub target: TargetSection,

    #[serde(default)]
    pub template: TemplateSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub convergence: ConvergenceSection,

    #[serde(default)]
    pub rollout: RolloutSection,

    #[serde(default)]
    pub health: HealthSection,
}

/// Which environment and stack a run targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Falls back to `AWS_REGION` / `AWS_DEFAULT_REGION`, then `us-east-1`.
    #[serde(default)]
    pub region: Option<String>,

    /// Stack name; `{environment}` is substituted. Defaults to `blog-{environment}`.
    #[serde(default = "default_stack_name")]
    pub stack_name: String,

    /// Named credentials profile passed to the aws CLI.
    #[serde(default)]
    pub profile: Option<String>,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            region: None,
            stack_name: default_stack_name(),
            profile: None,
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_stack_name() -> String {
    "blog-{environment}".to_string()
}

/// The topology template and what it requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TemplateSection {
    #[serde(default = "default_template_path")]
    pub path: PathBuf,

    /// Capabilities acknowledged on create/update.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    #[serde(default = "default_required_parameters")]
    pub required_parameters: Vec<String>,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            path: default_template_path(),
            capabilities: default_capabilities(),
            required_parameters: default_required_parameters(),
        }
    }
}

fn default_template_path() -> PathBuf {
    PathBuf::from("infrastructure/cloudformation.yaml")
}

fn default_capabilities() -> Vec<String> {
    vec!["CAPABILITY_IAM".to_string()]
}

fn default_required_parameters() -> Vec<String> {
    [
        "Environment",
        "DatabasePassword",
        "BackendRepositoryUri",
        "FrontendRepositoryUri",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Repository prefix; images land at `<host>/<prefix>/<component>`.
    #[serde(default = "default_registry_prefix")]
    pub prefix: String,

    #[serde(default = "default_tag")]
    pub tag: String,

    /// Account id; resolved from the caller identity when unset.
    #[serde(default)]
    pub account_id: Option<String>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            prefix: default_registry_prefix(),
            tag: default_tag(),
            account_id: None,
        }
    }
}

fn default_registry_prefix() -> String {
    "blog".to_string()
}

fn default_tag() -> String {
    "latest".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default = "default_backend_dir")]
    pub backend_dir: PathBuf,

    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: PathBuf,

    /// Target platform passed to `docker build --platform`.
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            backend_dir: default_backend_dir(),
            frontend_dir: default_frontend_dir(),
            platform: default_platform(),
        }
    }
}

fn default_backend_dir() -> PathBuf {
    PathBuf::from("backend")
}

fn default_frontend_dir() -> PathBuf {
    PathBuf::from("frontend")
}

fn default_platform() -> String {
    "linux/amd64".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConvergenceSection {
    #[serde(default = "default_convergence_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_convergence_attempts")]
    pub max_attempts: u32,
}

impl Default for ConvergenceSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_convergence_interval(),
            max_attempts: default_convergence_attempts(),
        }
    }
}

fn default_convergence_interval() -> u64 {
    15
}

fn default_convergence_attempts() -> u32 {
    // 15s * 160 = 40 minutes; a fresh stack with a database takes ~20.
    160
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RolloutSection {
    #[serde(default = "default_max_percent")]
    pub max_percent: u32,

    #[serde(default = "default_min_healthy_percent")]
    pub min_healthy_percent: u32,

    #[serde(default)]
    pub desired_count: Option<u32>,
}

impl Default for RolloutSection {
    fn default() -> Self {
        Self {
            max_percent: default_max_percent(),
            min_healthy_percent: default_min_healthy_percent(),
            desired_count: None,
        }
    }
}

fn default_max_percent() -> u32 {
    200
}

fn default_min_healthy_percent() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HealthSection {
    #[serde(default = "default_health_paths")]
    pub paths: Vec<String>,

    #[serde(default = "default_health_attempts")]
    pub attempts: u32,

    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            paths: default_health_paths(),
            attempts: default_health_attempts(),
            interval_secs: default_health_interval(),
            request_timeout_secs: default_request_timeout(),
            scheme: default_scheme(),
        }
    }
}

fn default_health_paths() -> Vec<String> {
    vec!["/health".to_string(), "/api/health".to_string()]
}

fn default_health_attempts() -> u32 {
    10
}

fn default_health_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_scheme() -> String {
    "http".to_string()
}
