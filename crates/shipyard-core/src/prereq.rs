//! Fail-fast checks run before any stage touches the outside world.

use crate::build::DockerCli;
use crate::config::DeploySettings;
use crate::control_plane::AwsCli;
use crate::error::{DeployError, Result};
use crate::pipeline::Stage;

/// An external executable the pipeline depends on.
pub trait ToolCheck {
    fn tool_name(&self) -> &str;

    /// Version string when available.
    fn check(&self) -> anyhow::Result<String>;
}

impl ToolCheck for AwsCli {
    fn tool_name(&self) -> &str {
        "aws CLI"
    }

    fn check(&self) -> anyhow::Result<String> {
        self.ensure_available()
    }
}

impl ToolCheck for DockerCli {
    fn tool_name(&self) -> &str {
        "docker"
    }

    fn check(&self) -> anyhow::Result<String> {
        self.ensure_available()
    }
}

/// Verify tools and inputs the given stages need.
///
/// Every stage talks to the control plane, so the aws CLI is always required.
pub fn verify(
    stages: &[Stage],
    settings: &DeploySettings,
    aws: &dyn ToolCheck,
    docker: &dyn ToolCheck,
) -> Result<()> {
    check_tool(aws)?;

    if stages.contains(&Stage::Build) {
        check_tool(docker)?;
    }

    if stages.contains(&Stage::Infrastructure) {
        if settings.database_password.is_none() {
            return Err(DeployError::MissingPrerequisite {
                what: "DATABASE_PASSWORD is not set".to_string(),
            });
        }
        if !settings.template.is_file() {
            return Err(DeployError::MissingPrerequisite {
                what: format!(
                    "topology template not found at {}",
                    settings.template.display()
                ),
            });
        }
    }

    Ok(())
}

fn check_tool(tool: &dyn ToolCheck) -> Result<()> {
    match tool.check() {
        Ok(version) => {
            tracing::debug!(tool = tool.tool_name(), %version, "found tool");
            Ok(())
        }
        Err(err) => Err(DeployError::MissingPrerequisite {
            what: format!("{} is not available: {:#}", tool.tool_name(), err),
        }),
    }
}
