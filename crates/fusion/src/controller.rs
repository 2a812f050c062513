/// Fusion job lifecycle
///
/// `Idle -> Submitting -> Polling -> (Succeeded | Failed)`. The controller
/// owns no timers: the caller drives every poll and decides when to give up.
/// Abandoning a job only forgets it locally; the remote job keeps running.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::FusionBackend;
use crate::job::{JobId, JobSpec, JobStatus};
use crate::{FusionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Idle,
    Submitting,
    Polling,
    Succeeded,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Submitting => write!(f, "submitting"),
            Self::Polling => write!(f, "polling"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobFailure {
    /// The enqueue call never produced a job.
    Submission { status: Option<u16>, message: String },
    /// The remote job itself reported failure.
    Job { message: String },
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submission {
                status: Some(code),
                message,
            } => write!(f, "submission failed (HTTP {code}): {message}"),
            Self::Submission {
                status: None,
                message,
            } => write!(f, "submission failed: {message}"),
            Self::Job { message } => write!(f, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Submitting,
    Polling {
        job_id: JobId,
        status: JobStatus,
        progress: Option<f32>,
    },
    Succeeded {
        job_id: JobId,
        result_url: String,
    },
    Failed {
        job_id: Option<JobId>,
        failure: JobFailure,
    },
}

impl JobState {
    pub fn phase(&self) -> JobPhase {
        match self {
            JobState::Idle => JobPhase::Idle,
            JobState::Submitting => JobPhase::Submitting,
            JobState::Polling { .. } => JobPhase::Polling,
            JobState::Succeeded { .. } => JobPhase::Succeeded,
            JobState::Failed { .. } => JobPhase::Failed,
        }
    }
}

pub struct JobController {
    backend: Arc<dyn FusionBackend>,
    state: JobState,
    transitions: Vec<JobPhase>,
}

impl JobController {
    pub fn new(backend: Arc<dyn FusionBackend>) -> Self {
        Self {
            backend,
            state: JobState::Idle,
            transitions: vec![JobPhase::Idle],
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn phase(&self) -> JobPhase {
        self.state.phase()
    }

    /// Every phase entered so far, starting with the initial `Idle`. A poll
    /// that changes the job's status or progress appends another `Polling`;
    /// one that reports nothing new does not.
    pub fn transitions(&self) -> &[JobPhase] {
        &self.transitions
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match &self.state {
            JobState::Polling { job_id, .. } | JobState::Succeeded { job_id, .. } => Some(job_id),
            JobState::Failed { job_id, .. } => job_id.as_ref(),
            JobState::Idle | JobState::Submitting => None,
        }
    }

    pub fn progress(&self) -> Option<f32> {
        match &self.state {
            JobState::Polling { progress, .. } => *progress,
            JobState::Succeeded { .. } => Some(100.0),
            _ => None,
        }
    }

    /// Only available once the job has succeeded.
    pub fn result_url(&self) -> Option<&str> {
        match &self.state {
            JobState::Succeeded { result_url, .. } => Some(result_url),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.state {
            JobState::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Moves to `state`. A poll that reports what is already known is not a
    /// transition and leaves the log alone.
    fn enter(&mut self, state: JobState) {
        if state == self.state {
            return;
        }
        debug!(from = %self.state.phase(), to = %state.phase(), "job state change");
        self.transitions.push(state.phase());
        self.state = state;
    }

    fn invalid(&self, operation: &'static str) -> FusionError {
        FusionError::InvalidState {
            operation,
            phase: self.phase(),
        }
    }

    /// Enqueue a job. Only allowed from `Idle`; a failed submission lands in
    /// `Failed` and the error is also returned to the caller.
    pub async fn submit(&mut self, spec: &JobSpec) -> Result<JobId> {
        if self.state != JobState::Idle {
            return Err(self.invalid("submit"));
        }
        self.enter(JobState::Submitting);

        match self.backend.submit(spec).await {
            Ok(job_id) => {
                info!(%job_id, backend = self.backend.name(), "fusion job submitted");
                self.enter(JobState::Polling {
                    job_id: job_id.clone(),
                    status: JobStatus::Queued,
                    progress: None,
                });
                Ok(job_id)
            }
            Err(err) => {
                warn!(error = %err, "fusion job submission failed");
                let (status, message) = match err {
                    FusionError::Submission { status, message } => (status, message),
                    other => (None, other.to_string()),
                };
                self.enter(JobState::Failed {
                    job_id: None,
                    failure: JobFailure::Submission {
                        status,
                        message: message.clone(),
                    },
                });
                Err(FusionError::Submission { status, message })
            }
        }
    }

    /// One poll step. Transport errors are returned and leave the state in
    /// `Polling`; `&mut self` keeps two polls from overlapping.
    pub async fn poll(&mut self) -> Result<&JobState> {
        let job_id = match &self.state {
            JobState::Polling { job_id, .. } => job_id.clone(),
            _ => return Err(self.invalid("poll")),
        };

        let job = self.backend.poll(&job_id).await?;

        let next = match job.status {
            JobStatus::Queued | JobStatus::Running => JobState::Polling {
                job_id,
                status: job.status,
                progress: job.progress,
            },
            JobStatus::Succeeded => match job.result_url {
                Some(result_url) => {
                    info!(%job_id, %result_url, "fusion job succeeded");
                    JobState::Succeeded { job_id, result_url }
                }
                None => JobState::Failed {
                    job_id: Some(job_id),
                    failure: JobFailure::Job {
                        message: "job succeeded without a result url".to_string(),
                    },
                },
            },
            JobStatus::Failed => {
                let message = job
                    .error_message
                    .unwrap_or_else(|| "fusion job failed".to_string());
                warn!(%job_id, %message, "fusion job failed");
                JobState::Failed {
                    job_id: Some(job_id),
                    failure: JobFailure::Job { message },
                }
            }
        };
        self.enter(next);
        Ok(&self.state)
    }

    /// Back to `Idle` after a failure so the same session can be resubmitted.
    pub fn retry(&mut self) -> Result<()> {
        if self.phase() != JobPhase::Failed {
            return Err(self.invalid("retry"));
        }
        self.enter(JobState::Idle);
        Ok(())
    }

    /// Abandon whatever is in flight and return to `Idle`. Returns the id of
    /// a job that was still being polled.
    pub fn cancel(&mut self) -> Option<JobId> {
        let abandoned = match &self.state {
            JobState::Polling { job_id, .. } => Some(job_id.clone()),
            _ => None,
        };
        if let Some(job_id) = &abandoned {
            info!(%job_id, "stopped polling fusion job; remote job keeps running");
        }
        if self.state != JobState::Idle {
            self.enter(JobState::Idle);
        }
        abandoned
    }
}
