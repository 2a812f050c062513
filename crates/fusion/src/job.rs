/// Fusion job wire types
use collage::{CollageSession, CollageSettings, Grid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier handed out by the remote queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote job status. The queue runner's own state names are accepted as
/// aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "waiting", alias = "delayed")]
    Queued,
    #[serde(alias = "active")]
    Running,
    #[serde(alias = "completed")]
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Client-side mirror of a remote job, rebuilt from every status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Percentage in [0, 100].
    pub progress: Option<f32>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

impl FusionJob {
    pub fn new(id: JobId, status: JobStatus) -> Self {
        Self {
            id,
            status,
            progress: None,
            result_url: None,
            error_message: None,
        }
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(clamp_progress(progress));
        self
    }

    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

pub(crate) fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    }
}

/// Body of the enqueue call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub owner_id: String,
    pub grid: Grid,
    pub settings: CollageSettings,
}

impl JobSpec {
    pub fn new(owner_id: impl Into<String>, grid: Grid, settings: CollageSettings) -> Self {
        Self {
            owner_id: owner_id.into(),
            grid,
            settings,
        }
    }

    pub fn from_session(owner_id: impl Into<String>, session: &CollageSession) -> Self {
        let (grid, settings) = session.snapshot();
        Self::new(owner_id, grid, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collage::Asset;

    #[test]
    fn test_status_aliases() {
        let parse = |s: &str| serde_json::from_str::<JobStatus>(&format!("\"{s}\"")).unwrap();
        assert_eq!(parse("queued"), JobStatus::Queued);
        assert_eq!(parse("waiting"), JobStatus::Queued);
        assert_eq!(parse("active"), JobStatus::Running);
        assert_eq!(parse("completed"), JobStatus::Succeeded);
        assert_eq!(parse("failed"), JobStatus::Failed);
        assert!(serde_json::from_str::<JobStatus>("\"paused\"").is_err());
    }

    #[test]
    fn test_progress_is_clamped() {
        let job = FusionJob::new(JobId::new("j"), JobStatus::Running).with_progress(140.0);
        assert_eq!(job.progress, Some(100.0));
        assert_eq!(clamp_progress(-3.0), 0.0);
        assert_eq!(clamp_progress(f32::NAN), 0.0);
    }

    #[test]
    fn test_job_spec_wire_shape() {
        let mut session = CollageSession::default();
        session
            .drop_on_cell(0, 0, (&Asset::new("42", "https://cdn.example/42.gif")).into())
            .unwrap();
        let spec = JobSpec::from_session("owner-1", &session);

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["ownerId"], "owner-1");
        assert_eq!(value["settings"]["columns"], 3);
        assert_eq!(value["settings"]["borderColor"], "#000000");
        assert_eq!(value["grid"].as_array().unwrap().len(), 2);
        assert_eq!(value["grid"][0][0]["asset"]["assetId"], "42");
        assert_eq!(value["grid"][1][2], serde_json::json!({ "index": 2, "asset": null }));
    }
}
