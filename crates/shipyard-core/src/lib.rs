//! Shipyard Core Library
//!
//! Deployment orchestration for a two-service web application: image builds,
//! idempotent stack convergence, rolling service updates and advisory health
//! verification, composed into one sequential pipeline.

pub mod build;
pub mod config;
pub mod context;
pub mod control_plane;
pub mod convergence;
pub mod error;
pub mod health;
pub mod outcome;
pub mod pipeline;
pub mod policy;
pub mod prereq;
pub mod rollout;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, DeploySettings, EnvOverrides, SettingsOverrides};
    pub use crate::context::DeployContext;

    // Errors and outcomes
    pub use crate::error::{DeployError, Result};
    pub use crate::outcome::Outcome;

    // Stages
    pub use crate::build::{ArtifactBuilder, ImageTool};
    pub use crate::convergence::{ConvergedStack, ConvergenceOutcome, StackConvergence};
    pub use crate::health::{HealthReport, HealthVerifier, HttpProbe};
    pub use crate::pipeline::{InfoReport, Pipeline, PipelineReport, Stage};
    pub use crate::rollout::{AggregatedRollout, RolloutDriver, RolloutReport};

    // Control plane
    pub use crate::control_plane::{ControlPlane, ControlPlaneError};
    pub use crate::policy::{RetryPolicy, Sleeper};

    // Domain types
    pub use crate::types::{Component, DeploymentTarget, ImageReference, ParameterSet, StackState};
}
