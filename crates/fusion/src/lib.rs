/// Fusion job pipeline
///
/// Submits a collage grid and its settings to the remote renderer, polls
/// the resulting job, and tracks its lifecycle.
use thiserror::Error;

pub mod backend;
pub mod config;
pub mod controller;
pub mod http;
pub mod job;
pub mod schedule;

#[cfg(test)]
mod testing;

pub use backend::{validate_upload_name, FusionBackend, UploadAck};
pub use config::FusionConfig;
pub use controller::{JobController, JobFailure, JobPhase, JobState};
pub use http::HttpFusionClient;
pub use job::{FusionJob, JobId, JobSpec, JobStatus};
pub use schedule::{drive_to_completion, DriveOutcome, PollPolicy};

fn status_note(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("job submission failed{}: {message}", status_note(.status))]
    Submission {
        status: Option<u16>,
        message: String,
    },

    #[error("job status check failed{}: {message}", status_note(.status))]
    Poll {
        status: Option<u16>,
        message: String,
    },

    #[error("upload failed{}: {message}", status_note(.status))]
    Upload {
        status: Option<u16>,
        message: String,
    },

    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: JobPhase,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FusionError>;
