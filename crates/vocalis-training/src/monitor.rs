//! Polling of an asynchronous training job until it reaches a terminal state.

use crate::error::{TrainingError, TrainingResult};
use crate::model::VoiceModel;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::retry::Sleeper;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vocalis_abstraction::VoiceTrainingService;

/// Default delay between two status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Consecutive failed status queries tolerated before giving up.
    pub max_consecutive_failures: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { poll_interval: DEFAULT_POLL_INTERVAL, max_consecutive_failures: 5 }
    }
}

/// Watches one training job at a time.
///
/// There is no overall deadline; callers bound the wait by cancelling the
/// token passed to [`TrainingJobMonitor::await_completion`].
pub struct TrainingJobMonitor {
    service: Arc<dyn VoiceTrainingService>,
    sleeper: Arc<dyn Sleeper>,
    progress: Arc<dyn ProgressSink>,
    config: MonitorConfig,
}

impl TrainingJobMonitor {
    pub fn new(
        service: Arc<dyn VoiceTrainingService>,
        sleeper: Arc<dyn Sleeper>,
        progress: Arc<dyn ProgressSink>,
        config: MonitorConfig,
    ) -> Self {
        Self { service, sleeper, progress, config }
    }

    /// Polls until the job is terminal and returns the final descriptor.
    ///
    /// Queries are spaced by exactly one poll interval. A failed query is
    /// retried on the next tick; `max_consecutive_failures` failures in a row
    /// end monitoring with `Monitoring`.
    pub async fn await_completion(
        &self,
        mut model: VoiceModel,
        cancel: &CancellationToken,
    ) -> TrainingResult<VoiceModel> {
        let job_id = model.model_id.clone();
        let mut consecutive_failures = 0u32;

        debug!(job_id = %job_id, status = %model.status, "Monitoring training job");

        while !model.is_terminal() {
            if cancel.is_cancelled() {
                return Err(cancelled(&job_id));
            }

            match self.service.job_status(&job_id).await {
                Ok(report) => {
                    consecutive_failures = 0;
                    if model.apply(&report) {
                        info!(job_id = %job_id, status = %model.status, "Training job status changed");
                        self.progress.on_event(ProgressEvent::JobStatusChanged {
                            job_id: job_id.clone(),
                            status: model.status,
                        });
                    }
                    if model.is_terminal() {
                        break;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        error!(job_id = %job_id, consecutive_failures, "Giving up on status polling: {}", e);
                        return Err(TrainingError::Monitoring {
                            job_id,
                            consecutive_failures,
                            cause: e.to_string(),
                        });
                    }
                    warn!(job_id = %job_id, consecutive_failures, "Status query failed: {}", e);
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(cancelled(&job_id)),
                () = self.sleeper.sleep(self.config.poll_interval) => {}
            }
        }

        info!(job_id = %job_id, status = %model.status, "Training job finished");
        Ok(model)
    }
}

fn cancelled(job_id: &str) -> TrainingError {
    TrainingError::Cancelled(format!("stopped monitoring training job {job_id}"))
}
