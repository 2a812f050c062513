/// Fusion client configuration
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::schedule::PollPolicy;
use crate::{FusionError, Result};

pub const DEFAULT_API_URL: &str = "https://api.dinoherd.cc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Base URL of the fusion service
    pub api_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    pub user_agent: String,

    /// File extensions accepted by `upload_asset`, without the dot
    pub upload_extensions: Vec<String>,

    /// Cadence used when driving a job to completion
    #[serde(default)]
    pub poll: PollPolicy,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: Some(30),
            user_agent: concat!("fuser/", env!("CARGO_PKG_VERSION")).to_string(),
            upload_extensions: vec!["mp3".to_string()],
            poll: PollPolicy::default(),
        }
    }
}

impl FusionConfig {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_upload_extensions(mut self, extensions: Vec<String>) -> Self {
        self.upload_extensions = extensions;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Save configuration to JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| FusionError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| FusionError::Config(format!("{}: {e}", path.display())))
    }
}
