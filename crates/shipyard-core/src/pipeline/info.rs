//! Read-only summary of a deployment target.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::Pipeline;
use crate::convergence::OUTPUT_ENTRY_POINT;
use crate::error::Result;
use crate::types::{Component, DeploymentTarget, ImageReference, StackState};

#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    pub target: DeploymentTarget,
    /// Empty when the account id could not be resolved.
    pub images: Vec<(Component, ImageReference)>,
    pub stack_state: StackState,
    pub stack_status: String,
    pub outputs: BTreeMap<String, String>,
    pub application_url: Option<String>,
}

impl Pipeline<'_> {
    /// Describe the target without mutating anything.
    ///
    /// An absent stack is reported as such rather than as an error.
    pub fn info(&self) -> Result<InfoReport> {
        let settings = self.settings;
        let images = match self.image_references() {
            Ok(images) => images,
            Err(err) => {
                warn!(error = %err, "image names unavailable");
                Vec::new()
            }
        };

        let description = self.convergence().observe(&settings.target.stack_name)?;

        let application_url = description
            .outputs
            .get(OUTPUT_ENTRY_POINT)
            .map(|host| format!("{}://{}", settings.health.scheme, host));

        Ok(InfoReport {
            target: settings.target.clone(),
            images,
            stack_state: description.state,
            stack_status: description.status,
            outputs: description.outputs,
            application_url,
        })
    }
}
