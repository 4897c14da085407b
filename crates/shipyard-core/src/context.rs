//! Deployment context: resolved settings plus the production collaborators.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::build::DockerCli;
use crate::config::{ConfigStore, DeploySettings, EnvOverrides, SettingsOverrides};
use crate::control_plane::AwsCli;
use crate::error::{DeployError, Result};
use crate::health::ReqwestProbe;
use crate::pipeline::{Pipeline, Stage};
use crate::policy::ThreadSleeper;
use crate::prereq;

/// Frontends build this once per invocation and borrow a [`Pipeline`] from it.
#[derive(Debug)]
pub struct DeployContext {
    project_root: PathBuf,
    config_path: Option<PathBuf>,
    settings: DeploySettings,
    aws: AwsCli,
    docker: DockerCli,
    probe: ReqwestProbe,
    sleeper: ThreadSleeper,
}

impl DeployContext {
    /// Resolve settings from the config file, the process environment and
    /// command-line overrides. The environment is read exactly once, here.
    pub fn from_environment(
        config_path: Option<PathBuf>,
        overrides: SettingsOverrides,
    ) -> Result<Self> {
        let project_root = std::env::current_dir()
            .context("Failed to determine current directory")
            .map_err(config_error)?;
        let env = EnvOverrides::from_vars(std::env::vars());
        Self::new(project_root, config_path, env, overrides)
    }

    pub fn new(
        project_root: PathBuf,
        config_path: Option<PathBuf>,
        env: EnvOverrides,
        overrides: SettingsOverrides,
    ) -> Result<Self> {
        let store = match config_path {
            Some(path) => ConfigStore::from_path(path),
            None => ConfigStore::discover(&project_root),
        };
        let config = store.load().map_err(config_error)?;
        let config_path = store.config_path().map(Path::to_path_buf);
        let settings = DeploySettings::resolve(&config, &env, &overrides, &project_root);
        tracing::debug!(?settings, config = ?config_path, "resolved settings");

        let aws = AwsCli::new(settings.target.region.clone()).with_profile(settings.profile.clone());
        let probe = ReqwestProbe::new(settings.health.request_timeout).map_err(config_error)?;

        Ok(Self {
            project_root,
            config_path,
            settings,
            aws,
            docker: DockerCli::new(),
            probe,
            sleeper: ThreadSleeper,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The config file that was loaded, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn settings(&self) -> &DeploySettings {
        &self.settings
    }

    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(
            &self.settings,
            &self.aws,
            &self.docker,
            &self.probe,
            &self.sleeper,
        )
    }

    /// Fail fast on missing tools or inputs before any stage runs.
    pub fn verify_prerequisites(&self, stages: &[Stage]) -> Result<()> {
        prereq::verify(stages, &self.settings, &self.aws, &self.docker)
    }
}

fn config_error(err: anyhow::Error) -> DeployError {
    DeployError::Config(format!("{:#}", err))
}
