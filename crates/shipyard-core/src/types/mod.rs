//! Shared core types used across the convergence, rollout and health stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployable application component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Backend,
    Frontend,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Backend, Component::Frontend];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Backend => "backend",
            Component::Frontend => "frontend",
        }
    }

    /// Template parameter carrying this component's repository URI.
    pub fn repository_parameter(&self) -> &'static str {
        match self {
            Component::Backend => "BackendRepositoryUri",
            Component::Frontend => "FrontendRepositoryUri",
        }
    }

    /// Template output naming this component's running service.
    pub fn service_output(&self) -> &'static str {
        match self {
            Component::Backend => "BackendServiceName",
            Component::Frontend => "FrontendServiceName",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies which topology instance a run converges. Immutable per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub environment: String,
    pub region: String,
    pub stack_name: String,
}

impl DeploymentTarget {
    pub fn new(
        environment: impl Into<String>,
        region: impl Into<String>,
        stack_name: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            region: region.into(),
            stack_name: stack_name.into(),
        }
    }
}

/// Template parameters, keyed by parameter name.
///
/// Values of keys marked secret never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BTreeMap<String, String>,
    secret: BTreeSet<String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_secret(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn insert_secret(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.secret.insert(key.clone());
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_secret(&self, key: &str) -> bool {
        self.secret.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First required key that is absent or empty, in the given order.
    pub fn first_missing<'a, I>(&self, required: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .find(|key| self.get(key).is_none_or(str::is_empty))
    }
}

impl fmt::Debug for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if self.secret.contains(key) {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

/// A container image address in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Registry host portion of the repository (everything before the first `/`).
    pub fn registry_host(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(host, _)| host)
            .unwrap_or(&self.repository)
    }

    /// Repository path without the registry host.
    pub fn repository_name(&self) -> &str {
        self.repository
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.repository)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Stack lifecycle as observed on the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackState {
    Absent,
    Creating,
    Updating,
    Deleting,
    CreateComplete,
    UpdateComplete,
    CreateFailed,
    UpdateFailed,
    /// A failed update was rolled back; the stack is back on its previous
    /// configuration and accepts further updates.
    UpdateRolledBack,
    NoUpdateNeeded,
}

impl StackState {
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            StackState::CreateComplete | StackState::UpdateComplete | StackState::NoUpdateNeeded
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            StackState::CreateFailed | StackState::UpdateFailed | StackState::UpdateRolledBack
        )
    }

    /// Whether an update may be submitted from this state.
    pub fn accepts_update(&self) -> bool {
        self.is_complete() || *self == StackState::UpdateRolledBack
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StackState::Absent => "absent",
            StackState::Creating => "creating",
            StackState::Updating => "updating",
            StackState::Deleting => "deleting",
            StackState::CreateComplete => "create-complete",
            StackState::UpdateComplete => "update-complete",
            StackState::CreateFailed => "create-failed",
            StackState::UpdateFailed => "update-failed",
            StackState::UpdateRolledBack => "update-rolled-back",
            StackState::NoUpdateNeeded => "no-update-needed",
        }
    }
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolling replacement bounds, as percentages of the desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConstraints {
    pub max_percent: u32,
    pub min_healthy_percent: u32,
}

impl Default for DeploymentConstraints {
    fn default() -> Self {
        Self {
            max_percent: 200,
            min_healthy_percent: 50,
        }
    }
}

/// A running service the Rollout Driver can target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub component: Component,
    pub cluster: String,
    pub service: String,
    /// `None` keeps whatever count the service is currently running.
    pub desired_count: Option<u32>,
    pub constraints: DeploymentConstraints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RolloutOutcome {
    Accepted { deployment_id: Option<String> },
    Rejected { reason: String },
}

impl RolloutOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RolloutOutcome::Accepted { .. })
    }
}

/// One replacement request and how the control plane answered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloutRecord {
    pub descriptor: ServiceDescriptor,
    pub triggered_at: DateTime<Utc>,
    pub outcome: RolloutOutcome,
}
