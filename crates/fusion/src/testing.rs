use collage::CollageSession;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{validate_upload_name, FusionBackend, UploadAck};
use crate::job::{FusionJob, JobId, JobSpec};
use crate::{FusionError, Result};

pub(crate) fn sample_spec() -> JobSpec {
    JobSpec::from_session("owner-1", &CollageSession::default())
}

/// Backend that replays canned responses in order.
pub(crate) struct ScriptedBackend {
    submit_result: Mutex<Option<Result<JobId>>>,
    polls: Mutex<VecDeque<Result<FusionJob>>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new(submit: Result<JobId>, polls: Vec<Result<FusionJob>>) -> Self {
        Self {
            submit_result: Mutex::new(Some(submit)),
            polls: Mutex::new(polls.into()),
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FusionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, _spec: &JobSpec) -> Result<JobId> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.submit_result.lock().unwrap().take();
        scripted.unwrap_or_else(|| {
            Err(FusionError::Submission {
                status: None,
                message: "no scripted submission left".to_string(),
            })
        })
    }

    async fn poll(&self, _job_id: &JobId) -> Result<FusionJob> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Err(FusionError::Poll {
                status: None,
                message: "script exhausted".to_string(),
            })
        })
    }

    async fn upload_asset(&self, file: &Path, _owner_id: &str) -> Result<UploadAck> {
        let name = file.display().to_string();
        validate_upload_name(&name, &["mp3".to_string()])?;
        Ok(UploadAck {
            file_name: name,
            bytes: 0,
            status: 200,
        })
    }
}
