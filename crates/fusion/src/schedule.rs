/// Caller-side polling cadence
///
/// Awaits each poll before sleeping for the next one, so polls for the
/// same job never overlap.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::controller::{JobController, JobPhase, JobState};
use crate::job::JobId;
use crate::{FusionError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay before the second poll, in milliseconds
    pub interval_ms: u64,
    /// Growth factor applied to the delay after every poll
    pub backoff: f32,
    pub max_interval_ms: u64,
    /// Polls allowed before the job is abandoned
    pub max_attempts: u32,
    /// Back-to-back poll errors tolerated before giving up
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            backoff: 1.5,
            max_interval_ms: 15_000,
            max_attempts: 200,
            max_consecutive_errors: 5,
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        let ms = interval.as_millis() as u64;
        Self {
            interval_ms: ms,
            backoff: 1.0,
            max_interval_ms: ms,
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay to wait after the `attempt`-th poll (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = f64::from(self.backoff.max(1.0)).powi(exponent);
        let ms = (self.interval_ms as f64 * factor).min(self.max_interval_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriveOutcome {
    /// The job reached `Succeeded` or `Failed`.
    Finished(JobState),
    /// Attempts ran out; the controller was reset to `Idle`.
    Abandoned { job_id: JobId, attempts: u32 },
}

/// Polls `controller` until the job finishes or the policy gives up.
///
/// Too many consecutive poll errors abandon the job and return the last
/// error. The controller must already be in `Polling` (or finished).
pub async fn drive_to_completion(
    controller: &mut JobController,
    policy: &PollPolicy,
) -> Result<DriveOutcome> {
    let mut attempts = 0u32;
    let mut errors = 0u32;

    loop {
        match controller.phase() {
            phase if phase.is_terminal() => {
                return Ok(DriveOutcome::Finished(controller.state().clone()))
            }
            JobPhase::Polling => {}
            phase => {
                return Err(FusionError::InvalidState {
                    operation: "drive polling",
                    phase,
                })
            }
        }

        if attempts >= policy.max_attempts {
            let job_id = controller.cancel();
            warn!(attempts, "giving up on fusion job");
            return match job_id {
                Some(job_id) => Ok(DriveOutcome::Abandoned { job_id, attempts }),
                None => Err(FusionError::InvalidState {
                    operation: "drive polling",
                    phase: JobPhase::Idle,
                }),
            };
        }

        attempts += 1;
        match controller.poll().await {
            Ok(state) => {
                errors = 0;
                debug!(attempts, phase = %state.phase(), "poll step");
            }
            Err(err) => {
                errors += 1;
                warn!(attempts, errors, error = %err, "poll step failed");
                if errors >= policy.max_consecutive_errors {
                    controller.cancel();
                    return Err(err);
                }
            }
        }

        if !controller.phase().is_terminal() {
            tokio::time::sleep(policy.delay_after(attempts)).await;
        }
    }
}
