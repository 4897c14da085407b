//! Rolling replacement of running services.
//!
//! The driver only *requests* replacement: it returns as soon as the control
//! plane has answered every request. Whether the new tasks come up healthy is
//! the health verifier's concern.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RolloutSettings;
use crate::control_plane::ControlPlane;
use crate::convergence::ConvergedStack;
use crate::error::{DeployError, RejectedService, Result};
use crate::types::{RolloutOutcome, RolloutRecord};

/// Aggregate view over a batch of replacement requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatedRollout {
    AllAccepted(usize),
    Partial { accepted: usize, total: usize },
    AllRejected(usize),
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct RolloutReport {
    pub records: Vec<RolloutRecord>,
}

impl RolloutReport {
    pub fn aggregated(&self) -> AggregatedRollout {
        let total = self.records.len();
        let accepted = self
            .records
            .iter()
            .filter(|r| r.outcome.is_accepted())
            .count();
        match (accepted, total) {
            (_, 0) => AggregatedRollout::Empty,
            (a, t) if a == t => AggregatedRollout::AllAccepted(a),
            (0, t) => AggregatedRollout::AllRejected(t),
            (a, t) => AggregatedRollout::Partial {
                accepted: a,
                total: t,
            },
        }
    }

    fn into_result(self) -> Result<Self> {
        let mut rejected = Vec::new();
        let mut accepted = Vec::new();
        for record in &self.records {
            match &record.outcome {
                RolloutOutcome::Accepted { .. } => accepted.push(record.descriptor.service.clone()),
                RolloutOutcome::Rejected { reason } => rejected.push(RejectedService {
                    service: record.descriptor.service.clone(),
                    reason: reason.clone(),
                }),
            }
        }
        if rejected.is_empty() {
            Ok(self)
        } else {
            Err(DeployError::RolloutFailure { rejected, accepted })
        }
    }
}

pub struct RolloutDriver<'a> {
    control_plane: &'a dyn ControlPlane,
    settings: RolloutSettings,
}

impl<'a> RolloutDriver<'a> {
    pub fn new(control_plane: &'a dyn ControlPlane, settings: RolloutSettings) -> Self {
        Self {
            control_plane,
            settings,
        }
    }

    /// Request replacement for every service of a converged stack.
    ///
    /// Every service is attempted even after a rejection, so a partial failure
    /// names exactly which services did not accept.
    pub fn roll_out(&self, stack: &ConvergedStack) -> Result<RolloutReport> {
        let descriptors = stack.service_descriptors(&self.settings);
        let mut records = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let triggered_at = Utc::now();
            let outcome = match self.control_plane.update_service(&descriptor) {
                Ok(ack) => {
                    info!(
                        cluster = %descriptor.cluster,
                        service = %descriptor.service,
                        deployment = ack.deployment_id.as_deref().unwrap_or("-"),
                        "replacement accepted"
                    );
                    RolloutOutcome::Accepted {
                        deployment_id: ack.deployment_id,
                    }
                }
                Err(err) => {
                    warn!(
                        cluster = %descriptor.cluster,
                        service = %descriptor.service,
                        error = %err,
                        "replacement rejected"
                    );
                    RolloutOutcome::Rejected {
                        reason: err.to_string(),
                    }
                }
            };
            records.push(RolloutRecord {
                descriptor,
                triggered_at,
                outcome,
            });
        }

        RolloutReport { records }.into_result()
    }
}
