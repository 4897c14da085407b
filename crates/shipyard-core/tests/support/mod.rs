//! Shared test doubles: a scripted control plane, an image tool, an HTTP
//! probe and a sleeper that only records.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use shipyard_core::build::ImageTool;
use shipyard_core::config::{DeploySettings, EnvOverrides, SettingsOverrides, ShipyardConfig};
use shipyard_core::control_plane::{
    ControlPlane, ControlPlaneError, ServiceUpdateAck, StackDescription, StackRequest,
    UpdateSubmission,
};
use shipyard_core::health::HttpProbe;
use shipyard_core::policy::Sleeper;
use shipyard_core::types::{ImageReference, ParameterSet, ServiceDescriptor, StackState};

pub const ACCOUNT: &str = "123456789012";

/// Outputs a fully provisioned stack exposes.
pub fn full_outputs() -> BTreeMap<String, String> {
    [
        ("VPCId", "vpc-0abc"),
        ("ClusterName", "blog-cluster"),
        ("BackendServiceName", "blog-backend"),
        ("FrontendServiceName", "blog-frontend"),
        ("ALBDNSName", "blog-alb-1.us-east-1.elb.amazonaws.com"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn stack(state: StackState) -> StackDescription {
    let outputs = if state.is_complete() {
        full_outputs()
    } else {
        BTreeMap::new()
    };
    StackDescription {
        state,
        status: state.as_str().to_uppercase().replace('-', "_"),
        status_reason: None,
        outputs,
    }
}

/// Control plane double. `describe_stack` replays a script; the last entry
/// repeats once the script runs out.
#[derive(Default)]
pub struct FakeControlPlane {
    describes: RefCell<VecDeque<StackDescription>>,
    update_answer: RefCell<Option<UpdateSubmission>>,
    create_error: RefCell<Option<String>>,
    rejected_services: HashSet<String>,
    account: Option<String>,
    calls: RefCell<Vec<String>>,
    submitted: RefCell<Vec<ParameterSet>>,
    service_updates: RefCell<Vec<ServiceDescriptor>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            account: Some(ACCOUNT.to_string()),
            ..Self::default()
        }
    }

    pub fn with_states(states: &[StackState]) -> Self {
        let fake = Self::new();
        fake.script(states);
        fake
    }

    pub fn script(&self, states: &[StackState]) {
        let mut describes = self.describes.borrow_mut();
        describes.clear();
        describes.extend(states.iter().map(|&s| stack(s)));
    }

    pub fn answer_update_with(&self, answer: UpdateSubmission) {
        *self.update_answer.borrow_mut() = Some(answer);
    }

    pub fn fail_create_with(&self, message: &str) {
        *self.create_error.borrow_mut() = Some(message.to_string());
    }

    pub fn reject_service(mut self, service: &str) -> Self {
        self.rejected_services.insert(service.to_string());
        self
    }

    pub fn without_account(mut self) -> Self {
        self.account = None;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Stack creates, stack updates and service updates.
    pub fn mutations(&self) -> usize {
        self.count("create-stack") + self.count("update-stack") + self.count("update-service")
    }

    pub fn submitted_parameters(&self) -> Vec<ParameterSet> {
        self.submitted.borrow().clone()
    }

    pub fn service_updates(&self) -> Vec<ServiceDescriptor> {
        self.service_updates.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl ControlPlane for FakeControlPlane {
    fn describe_stack(&self, stack_name: &str) -> Result<StackDescription, ControlPlaneError> {
        self.record(format!("describe-stack {}", stack_name));
        let mut describes = self.describes.borrow_mut();
        let next = if describes.len() > 1 {
            describes.pop_front()
        } else {
            describes.front().cloned()
        };
        Ok(next.unwrap_or_else(StackDescription::absent))
    }

    fn create_stack(&self, request: &StackRequest<'_>) -> Result<String, ControlPlaneError> {
        self.record(format!("create-stack {}", request.stack_name));
        self.submitted.borrow_mut().push(request.parameters.clone());
        if let Some(message) = self.create_error.borrow().as_ref() {
            return Err(ControlPlaneError::rejected("create-stack", message.clone()));
        }
        Ok(format!("arn:aws:cloudformation:stack/{}", request.stack_name))
    }

    fn update_stack(
        &self,
        request: &StackRequest<'_>,
    ) -> Result<UpdateSubmission, ControlPlaneError> {
        self.record(format!("update-stack {}", request.stack_name));
        self.submitted.borrow_mut().push(request.parameters.clone());
        Ok(self
            .update_answer
            .borrow()
            .clone()
            .unwrap_or(UpdateSubmission::Submitted {
                stack_id: format!("arn:aws:cloudformation:stack/{}", request.stack_name),
            }))
    }

    fn update_service(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<ServiceUpdateAck, ControlPlaneError> {
        self.record(format!("update-service {}", descriptor.service));
        self.service_updates.borrow_mut().push(descriptor.clone());
        if self.rejected_services.contains(&descriptor.service) {
            return Err(ControlPlaneError::rejected(
                "ecs update-service",
                "ServiceNotActiveException: Service was not ACTIVE.",
            ));
        }
        Ok(ServiceUpdateAck {
            deployment_id: Some(format!("ecs-svc/{}", descriptor.service)),
        })
    }

    fn caller_account(&self) -> Result<String, ControlPlaneError> {
        self.record("caller-account".to_string());
        self.account.clone().ok_or_else(|| {
            ControlPlaneError::rejected("sts get-caller-identity", "Unable to locate credentials")
        })
    }

    fn registry_password(&self) -> Result<String, ControlPlaneError> {
        self.record("registry-password".to_string());
        Ok("registry-token".to_string())
    }

    fn ensure_repository(&self, repository_name: &str) -> Result<(), ControlPlaneError> {
        self.record(format!("ensure-repository {}", repository_name));
        Ok(())
    }
}

/// Image tool double recording builds, logins and pushes.
#[derive(Default)]
pub struct FakeImageTool {
    fail_build_in: Option<PathBuf>,
    calls: RefCell<Vec<String>>,
}

impl FakeImageTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_build_in(dir: &Path) -> Self {
        Self {
            fail_build_in: Some(dir.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl ImageTool for FakeImageTool {
    fn build(&self, context: &Path, image: &ImageReference, _platform: &str) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(format!("build {}", image));
        if self.fail_build_in.as_deref() == Some(context) {
            anyhow::bail!("failed to solve: process \"/bin/sh -c npm ci\" did not complete successfully");
        }
        Ok(())
    }

    fn login(&self, registry_host: &str, _password: &str) -> anyhow::Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("login {}", registry_host));
        Ok(())
    }

    fn push(&self, image: &ImageReference) -> anyhow::Result<()> {
        self.calls.borrow_mut().push(format!("push {}", image));
        Ok(())
    }
}

/// Probe double: answers from a per-URL script, last answer repeating.
/// URLs without a script answer 200.
#[derive(Default)]
pub struct FakeProbe {
    answers: RefCell<BTreeMap<String, VecDeque<Result<u16, String>>>>,
    requests: RefCell<Vec<String>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, url: &str, answers: &[Result<u16, &str>]) -> Self {
        self.answers.borrow_mut().insert(
            url.to_string(),
            answers
                .iter()
                .map(|a| a.map_err(|e| e.to_string()))
                .collect(),
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl HttpProbe for FakeProbe {
    fn get_status(&self, url: &str) -> anyhow::Result<u16> {
        self.requests.borrow_mut().push(url.to_string());
        let mut answers = self.answers.borrow_mut();
        let Some(script) = answers.get_mut(url) else {
            return Ok(200);
        };
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(code)) => Ok(code),
            Some(Err(err)) => Err(anyhow::anyhow!(err)),
            None => Ok(200),
        }
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Settings for a project rooted at `root`, with the given variables as the
/// process environment.
pub fn settings_with_env(root: &Path, vars: &[(&str, &str)]) -> DeploySettings {
    DeploySettings::resolve(
        &ShipyardConfig::default(),
        &EnvOverrides::from_vars(vars.iter().copied()),
        &SettingsOverrides::default(),
        root,
    )
}

/// Settings with a database password and account id, the usual happy path.
pub fn settings(root: &Path) -> DeploySettings {
    settings_with_env(
        root,
        &[("DATABASE_PASSWORD", "s3cret-pw"), ("AWS_ACCOUNT_ID", ACCOUNT)],
    )
}

/// Lay out backend/frontend source dirs and the template under `root`.
pub fn scaffold_project(root: &Path) {
    std::fs::create_dir_all(root.join("backend")).unwrap();
    std::fs::create_dir_all(root.join("frontend")).unwrap();
    std::fs::create_dir_all(root.join("infrastructure")).unwrap();
    std::fs::write(
        root.join("infrastructure/cloudformation.yaml"),
        "AWSTemplateFormatVersion: '2010-09-09'\nResources: {}\n",
    )
    .unwrap();
}
