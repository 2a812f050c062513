/// Fusion service abstraction
///
/// The lifecycle controller talks to the renderer only through this trait,
/// so it can run against the HTTP client or a scripted stand-in.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::job::{FusionJob, JobId, JobSpec};
use crate::{FusionError, Result};

/// Acknowledgement of a supplementary upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub file_name: String,
    pub bytes: u64,
    pub status: u16,
}

#[async_trait::async_trait]
pub trait FusionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Enqueue a render. Every call creates a new remote job.
    async fn submit(&self, spec: &JobSpec) -> Result<JobId>;

    /// Read the job's current status. A `Failed` job is a normal result, not
    /// an error.
    async fn poll(&self, job_id: &JobId) -> Result<FusionJob>;

    /// Upload a file tied to the owner, validated by extension first.
    async fn upload_asset(&self, file: &Path, owner_id: &str) -> Result<UploadAck>;
}

/// Checks the file name's suffix against `allowed` (case-insensitive,
/// without the dot).
pub fn validate_upload_name(file_name: &str, allowed: &[String]) -> Result<()> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) => Ok(()),
        _ => Err(FusionError::UnsupportedFileType(file_name.to_string())),
    }
}
