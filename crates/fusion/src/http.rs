/// HTTP client for the fusion service
///
/// Endpoints:
/// - `POST {api_url}/queue-job/{ownerId}` with a [`JobSpec`] body
/// - `GET  {api_url}/job-progress/{jobId}`
/// - `POST {api_url}/audio?userId={ownerId}` multipart upload
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::{validate_upload_name, FusionBackend, UploadAck};
use crate::config::FusionConfig;
use crate::job::{clamp_progress, FusionJob, JobId, JobSpec, JobStatus};
use crate::{FusionError, Result};

pub struct HttpFusionClient {
    config: FusionConfig,
    client: reqwest::Client,
}

impl HttpFusionClient {
    pub fn new(config: FusionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FusionError::Config(e.to_string()))?;

        // Fail early on an unusable base URL rather than on the first request.
        endpoint(&config.api_url, &[])?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }
}

fn endpoint(base: &str, segments: &[&str]) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| FusionError::Config(format!("invalid api_url {base}: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| FusionError::Config(format!("api_url {base} cannot be a base")))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

#[async_trait::async_trait]
impl FusionBackend for HttpFusionClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, spec: &JobSpec) -> Result<JobId> {
        let url = endpoint(&self.config.api_url, &["queue-job", &spec.owner_id])?;
        debug!(%url, rows = spec.grid.rows(), columns = spec.grid.columns(), "enqueue fusion job");

        let response = self
            .client
            .post(url)
            .json(spec)
            .send()
            .await
            .map_err(|e| FusionError::Submission {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FusionError::Submission {
                status: Some(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: EnqueueResponse = response.json().await.map_err(|e| FusionError::Submission {
            status: Some(status.as_u16()),
            message: format!("unreadable enqueue response: {e}"),
        })?;
        info!(job_id = %body.job_id, "fusion job queued");
        Ok(JobId(body.job_id))
    }

    async fn poll(&self, job_id: &JobId) -> Result<FusionJob> {
        let url = endpoint(&self.config.api_url, &["job-progress", job_id.as_str()])?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FusionError::Poll {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FusionError::Poll {
                status: Some(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: StatusResponse = response.json().await.map_err(|e| FusionError::Poll {
            status: Some(status.as_u16()),
            message: format!("unreadable status response: {e}"),
        })?;
        debug!(%job_id, status = %body.status, progress = ?body.progress, "job progress");

        Ok(FusionJob {
            id: job_id.clone(),
            status: body.status,
            progress: body.progress.map(clamp_progress),
            result_url: body.result_url,
            error_message: body.error_message,
        })
    }

    async fn upload_asset(&self, file: &Path, owner_id: &str) -> Result<UploadAck> {
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| FusionError::UnsupportedFileType(file.display().to_string()))?;
        validate_upload_name(file_name, &self.config.upload_extensions)?;

        if owner_id.is_empty() {
            return Err(FusionError::Upload {
                status: None,
                message: "owner id is required".to_string(),
            });
        }

        let bytes = tokio::fs::read(file).await?;
        let size = bytes.len() as u64;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|e| FusionError::Upload {
                status: None,
                message: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut url = endpoint(&self.config.api_url, &["audio"])?;
        url.query_pairs_mut().append_pair("userId", owner_id);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FusionError::Upload {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FusionError::Upload {
                status: Some(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
            });
        }

        info!(file = file_name, bytes = size, owner = owner_id, "asset uploaded");
        Ok(UploadAck {
            file_name: file_name.to_string(),
            bytes: size,
            status: status.as_u16(),
        })
    }
}

/// Enqueue response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueResponse {
    #[serde(alias = "id")]
    job_id: String,
}

/// Status response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: JobStatus,
    #[serde(default)]
    progress: Option<f32>,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let url = endpoint("https://api.dinoherd.cc", &["queue-job", "owner 1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.dinoherd.cc/queue-job/owner%201");

        let url = endpoint("http://localhost:8080/v1/", &["job-progress", "7"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/job-progress/7");

        assert!(matches!(endpoint("not a url", &[]), Err(FusionError::Config(_))));
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let config = FusionConfig::default().with_api_url("mailto:someone@example.com");
        assert!(HttpFusionClient::new(config).is_err());
    }

    #[test]
    fn test_status_response_parsing() {
        let body: StatusResponse =
            serde_json::from_str(r#"{"status":"active","progress":40}"#).unwrap();
        assert_eq!(body.status, JobStatus::Running);
        assert_eq!(body.progress, Some(40.0));
        assert!(body.result_url.is_none());

        let body: StatusResponse = serde_json::from_str(
            r#"{"status":"completed","progress":100,"resultUrl":"https://cdn.example/out.gif"}"#,
        )
        .unwrap();
        assert_eq!(body.status, JobStatus::Succeeded);
        assert_eq!(body.result_url.as_deref(), Some("https://cdn.example/out.gif"));
    }

    #[test]
    fn test_enqueue_response_accepts_id_alias() {
        let a: EnqueueResponse = serde_json::from_str(r#"{"jobId":"job-1"}"#).unwrap();
        let b: EnqueueResponse = serde_json::from_str(r#"{"id":"job-1"}"#).unwrap();
        assert_eq!(a.job_id, b.job_id);
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("Track.MP3"), "audio/mpeg");
        assert_eq!(mime_for("x.bin"), "application/octet-stream");
    }
}
