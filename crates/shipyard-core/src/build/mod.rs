//! Artifact builder: container images for each component.
//!
//! Images are published under a deterministic, mutable tag (`:latest` by
//! default). Pushing overwrites whatever the tag pointed at before; the
//! digest of the pushed image is not recorded.

mod docker;

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::BuildSettings;
use crate::control_plane::ControlPlane;
use crate::error::{DeployError, Result};
use crate::types::{Component, ImageReference};

pub use docker::DockerCli;

/// Builds, tags and pushes container images.
pub trait ImageTool {
    fn build(&self, context: &Path, image: &ImageReference, platform: &str) -> anyhow::Result<()>;

    fn login(&self, registry_host: &str, password: &str) -> anyhow::Result<()>;

    fn push(&self, image: &ImageReference) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltImage {
    pub component: Component,
    pub image: ImageReference,
}

pub struct ArtifactBuilder<'a> {
    tool: &'a dyn ImageTool,
    control_plane: &'a dyn ControlPlane,
    settings: BuildSettings,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(
        tool: &'a dyn ImageTool,
        control_plane: &'a dyn ControlPlane,
        settings: BuildSettings,
    ) -> Self {
        Self {
            tool,
            control_plane,
            settings,
        }
    }

    /// Build every image, then log in once and publish them.
    ///
    /// Nothing is pushed unless every build succeeded. Failures are not retried.
    pub fn build_and_publish(
        &self,
        images: &[(Component, ImageReference)],
    ) -> Result<Vec<BuiltImage>> {
        for (component, image) in images {
            self.build_one(*component, image)?;
        }

        let Some((_, first)) = images.first() else {
            return Ok(Vec::new());
        };
        self.login(first)?;

        let mut built = Vec::with_capacity(images.len());
        for (component, image) in images {
            self.publish_one(image)?;
            built.push(BuiltImage {
                component: *component,
                image: image.clone(),
            });
        }
        Ok(built)
    }

    fn build_one(&self, component: Component, image: &ImageReference) -> Result<()> {
        let context = self.settings.source_dir(component);
        if !context.is_dir() {
            return Err(DeployError::BuildFailure {
                component,
                reason: format!("source directory not found: {}", context.display()),
            });
        }
        info!(%component, image = %image, "building image");
        self.tool
            .build(context, image, &self.settings.platform)
            .map_err(|e| DeployError::BuildFailure {
                component,
                reason: format!("{:#}", e),
            })
    }

    fn login(&self, image: &ImageReference) -> Result<()> {
        let host = image.registry_host();
        let publish_failure = |reason: String| DeployError::PublishFailure {
            image: image.to_string(),
            reason,
        };
        let password = self
            .control_plane
            .registry_password()
            .map_err(|e| publish_failure(format!("registry authentication failed: {}", e)))?;
        self.tool
            .login(host, &password)
            .map_err(|e| publish_failure(format!("{:#}", e)))
    }

    fn publish_one(&self, image: &ImageReference) -> Result<()> {
        let publish_failure = |reason: String| DeployError::PublishFailure {
            image: image.to_string(),
            reason,
        };
        self.control_plane
            .ensure_repository(image.repository_name())
            .map_err(|e| publish_failure(e.to_string()))?;
        info!(image = %image, "pushing image");
        self.tool
            .push(image)
            .map_err(|e| publish_failure(format!("{:#}", e)))
    }
}
