//! [`ControlPlane`] backed by the `aws` command-line client.
//!
//! Every call is a single `aws` invocation with `--output json`; responses are
//! decoded with serde. Vendor error text is only inspected in the `classify_*`
//! functions at the bottom of this file.

use std::collections::BTreeMap;
use std::process::{Command, Output};

use serde::Deserialize;
use tracing::debug;

use super::{
    ControlPlane, ControlPlaneError, ServiceDescriptor, ServiceUpdateAck, StackDescription,
    StackRequest, UpdateSubmission,
};
use crate::types::StackState;

const DEFAULT_PROGRAM: &str = "aws";

#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
    profile: Option<String>,
}

impl AwsCli {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            region: region.into(),
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Check that the CLI is installed and answers `--version`.
    pub fn ensure_available(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to invoke {} --version: {}", self.program, e))?;
        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.program, output.status);
        }
        // aws v1 prints its version on stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        };
        Ok(text)
    }

    fn run(&self, operation: &str, args: &[String]) -> Result<Output, ControlPlaneError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .args(["--region", self.region.as_str(), "--output", "json"]);
        if let Some(profile) = &self.profile {
            cmd.args(["--profile", profile.as_str()]);
        }
        debug!(operation, region = %self.region, "invoking aws");
        cmd.output().map_err(|source| ControlPlaneError::Spawn {
            program: self.program.clone(),
            source,
        })
    }

    fn run_checked(&self, operation: &str, args: &[String]) -> Result<Vec<u8>, ControlPlaneError> {
        let output = self.run(operation, args)?;
        if !output.status.success() {
            return Err(ControlPlaneError::rejected(operation, stderr_text(&output)));
        }
        Ok(output.stdout)
    }
}

impl ControlPlane for AwsCli {
    fn describe_stack(&self, stack_name: &str) -> Result<StackDescription, ControlPlaneError> {
        let operation = "cloudformation describe-stacks";
        let output = self.run(
            operation,
            &args(["cloudformation", "describe-stacks", "--stack-name", stack_name]),
        )?;
        if !output.status.success() {
            return classify_describe_failure(operation, &stderr_text(&output));
        }
        parse_stack_description(&output.stdout)
    }

    fn create_stack(&self, request: &StackRequest<'_>) -> Result<String, ControlPlaneError> {
        let operation = "cloudformation create-stack";
        let stdout = self.run_checked(operation, &stack_args("create-stack", request)?)?;
        let response: StackIdResponse = decode(operation, &stdout)?;
        Ok(response.stack_id)
    }

    fn update_stack(
        &self,
        request: &StackRequest<'_>,
    ) -> Result<UpdateSubmission, ControlPlaneError> {
        let operation = "cloudformation update-stack";
        let output = self.run(operation, &stack_args("update-stack", request)?)?;
        if !output.status.success() {
            return classify_update_failure(operation, &stderr_text(&output));
        }
        let response: StackIdResponse = decode(operation, &output.stdout)?;
        Ok(UpdateSubmission::Submitted {
            stack_id: response.stack_id,
        })
    }

    fn update_service(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<ServiceUpdateAck, ControlPlaneError> {
        let operation = "ecs update-service";
        let stdout = self.run_checked(operation, &service_args(descriptor))?;
        let response: UpdateServiceResponse = decode(operation, &stdout)?;
        let deployment_id = response
            .service
            .deployments
            .iter()
            .find(|d| d.status.as_deref() == Some("PRIMARY"))
            .or_else(|| response.service.deployments.first())
            .map(|d| d.id.clone());
        Ok(ServiceUpdateAck { deployment_id })
    }

    fn caller_account(&self) -> Result<String, ControlPlaneError> {
        let operation = "sts get-caller-identity";
        let stdout = self.run_checked(operation, &args(["sts", "get-caller-identity"]))?;
        let identity: CallerIdentity = decode(operation, &stdout)?;
        Ok(identity.account)
    }

    fn registry_password(&self) -> Result<String, ControlPlaneError> {
        let operation = "ecr get-login-password";
        let stdout = self.run_checked(operation, &args(["ecr", "get-login-password"]))?;
        let password = String::from_utf8_lossy(&stdout).trim().to_string();
        if password.is_empty() {
            return Err(ControlPlaneError::malformed(operation, "empty password"));
        }
        Ok(password)
    }

    fn ensure_repository(&self, repository_name: &str) -> Result<(), ControlPlaneError> {
        let operation = "ecr describe-repositories";
        let output = self.run(
            operation,
            &args([
                "ecr",
                "describe-repositories",
                "--repository-names",
                repository_name,
            ]),
        )?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = stderr_text(&output);
        if !is_missing_repository(&stderr) {
            return Err(ControlPlaneError::rejected(operation, stderr));
        }

        debug!(repository = repository_name, "creating registry repository");
        self.run_checked(
            "ecr create-repository",
            &args([
                "ecr",
                "create-repository",
                "--repository-name",
                repository_name,
            ]),
        )?;
        Ok(())
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn stack_args(verb: &str, request: &StackRequest<'_>) -> Result<Vec<String>, ControlPlaneError> {
    let mut out = args(["cloudformation", verb, "--stack-name", request.stack_name]);
    out.push("--template-body".to_string());
    out.push(format!("file://{}", request.template.display()));
    out.push("--parameters".to_string());
    out.push(parameters_json(request)?);
    if !request.capabilities.is_empty() {
        out.push("--capabilities".to_string());
        out.extend(request.capabilities.iter().cloned());
    }
    Ok(out)
}

/// JSON form of `--parameters`; avoids the shorthand syntax, which breaks on commas.
fn parameters_json(request: &StackRequest<'_>) -> Result<String, ControlPlaneError> {
    let entries: Vec<serde_json::Value> = request
        .parameters
        .iter()
        .map(|(key, value)| {
            serde_json::json!({
                "ParameterKey": key,
                "ParameterValue": value,
            })
        })
        .collect();
    serde_json::to_string(&entries)
        .map_err(|e| ControlPlaneError::malformed("encode parameters", e.to_string()))
}

fn service_args(descriptor: &ServiceDescriptor) -> Vec<String> {
    let mut out = args([
        "ecs",
        "update-service",
        "--cluster",
        descriptor.cluster.as_str(),
        "--service",
        descriptor.service.as_str(),
        "--force-new-deployment",
        "--deployment-configuration",
    ]);
    out.push(format!(
        "maximumPercent={},minimumHealthyPercent={}",
        descriptor.constraints.max_percent, descriptor.constraints.min_healthy_percent
    ));
    if let Some(count) = descriptor.desired_count {
        out.push("--desired-count".to_string());
        out.push(count.to_string());
    }
    out
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn decode<T: serde::de::DeserializeOwned>(
    operation: &str,
    bytes: &[u8],
) -> Result<T, ControlPlaneError> {
    serde_json::from_slice(bytes).map_err(|e| ControlPlaneError::malformed(operation, e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    #[serde(default)]
    stacks: Vec<StackSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackSummary {
    stack_status: String,
    stack_status_reason: Option<String>,
    #[serde(default)]
    outputs: Vec<StackOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackOutput {
    output_key: String,
    output_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackIdResponse {
    stack_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Debug, Deserialize)]
struct UpdateServiceResponse {
    service: ServiceBody,
}

#[derive(Debug, Deserialize)]
struct ServiceBody {
    #[serde(default)]
    deployments: Vec<ServiceDeployment>,
}

#[derive(Debug, Deserialize)]
struct ServiceDeployment {
    id: String,
    status: Option<String>,
}

fn parse_stack_description(bytes: &[u8]) -> Result<StackDescription, ControlPlaneError> {
    let operation = "cloudformation describe-stacks";
    let response: DescribeStacksResponse = decode(operation, bytes)?;
    let Some(stack) = response.stacks.into_iter().next() else {
        return Ok(StackDescription::absent());
    };
    let state = map_stack_status(&stack.stack_status).ok_or_else(|| {
        ControlPlaneError::malformed(
            operation,
            format!("unknown stack status {}", stack.stack_status),
        )
    })?;
    let outputs: BTreeMap<String, String> = stack
        .outputs
        .into_iter()
        .map(|o| (o.output_key, o.output_value))
        .collect();
    Ok(StackDescription {
        state,
        status: stack.stack_status,
        status_reason: stack.stack_status_reason,
        outputs,
    })
}

/// Fold CloudFormation's status vocabulary into [`StackState`].
///
/// Rollback states count as failures of the operation that triggered them.
/// A completed update rollback is kept apart because the stack still accepts
/// updates from there.
fn map_stack_status(status: &str) -> Option<StackState> {
    let state = match status {
        "CREATE_IN_PROGRESS" => StackState::Creating,
        // A change set was created but never executed. Neither create-stack
        // nor update-stack is accepted until it is executed or deleted, so
        // the stack reads as busy on every run until someone intervenes.
        "REVIEW_IN_PROGRESS" => StackState::Creating,
        "CREATE_COMPLETE" => StackState::CreateComplete,
        "CREATE_FAILED" | "ROLLBACK_IN_PROGRESS" | "ROLLBACK_COMPLETE" | "ROLLBACK_FAILED" => {
            StackState::CreateFailed
        }
        "UPDATE_IN_PROGRESS"
        | "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"
        | "UPDATE_ROLLBACK_IN_PROGRESS"
        | "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
        | "IMPORT_IN_PROGRESS"
        | "IMPORT_ROLLBACK_IN_PROGRESS" => StackState::Updating,
        "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackState::UpdateComplete,
        "UPDATE_ROLLBACK_COMPLETE" | "IMPORT_ROLLBACK_COMPLETE" => StackState::UpdateRolledBack,
        "UPDATE_FAILED" | "UPDATE_ROLLBACK_FAILED" | "IMPORT_ROLLBACK_FAILED" | "DELETE_FAILED" => {
            StackState::UpdateFailed
        }
        "DELETE_IN_PROGRESS" => StackState::Deleting,
        "DELETE_COMPLETE" => StackState::Absent,
        _ => return None,
    };
    Some(state)
}

/// Interpret a failed `update-stack` call.
///
/// CloudFormation answers an update that changes nothing with a
/// `ValidationError` whose message contains "No updates are to be performed".
/// That response becomes [`UpdateSubmission::NoChanges`]; every other failure
/// is a rejection.
pub fn classify_update_failure(
    operation: &str,
    stderr: &str,
) -> Result<UpdateSubmission, ControlPlaneError> {
    if stderr
        .to_ascii_lowercase()
        .contains("no updates are to be performed")
    {
        return Ok(UpdateSubmission::NoChanges);
    }
    Err(ControlPlaneError::rejected(operation, stderr))
}

/// Interpret a failed `describe-stacks` call.
///
/// A `ValidationError` reading "Stack with id <name> does not exist" means the
/// stack is absent; every other failure is a rejection.
pub fn classify_describe_failure(
    operation: &str,
    stderr: &str,
) -> Result<StackDescription, ControlPlaneError> {
    if stderr.contains("does not exist") {
        return Ok(StackDescription::absent());
    }
    Err(ControlPlaneError::rejected(operation, stderr))
}

fn is_missing_repository(stderr: &str) -> bool {
    stderr.contains("RepositoryNotFoundException")
}
