//! Runtime configuration
//!
//! Settings come from the environment (a `.env` file in the working directory
//! is loaded first) and may be overridden by command-line flags.
//!
//! | Variable | Default |
//! |---|---|
//! | `STUDIO_API_URL` | `http://localhost:8000` |
//! | `STUDIO_REMOTE_SESSIONS` | `true` |
//! | `STUDIO_DATA_DIR` | platform data dir for `script-studio` |
//! | `STUDIO_REQUEST_TIMEOUT_SECS` | `300` |
//! | `STUDIO_STREAM_TAIL` | `flush` |

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use studio_client::transport::HttpTransportConfig;
use studio_client::TailPolicy;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub api_url: String,
    /// Use the service's session store, falling back locally
    pub remote_sessions: bool,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub tail_policy: TailPolicy,
}

impl StudioConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let remote_sessions = match get("STUDIO_REMOTE_SESSIONS") {
            Some(value) => parse_bool(&value).context("STUDIO_REMOTE_SESSIONS")?,
            None => true,
        };
        let request_timeout = match get("STUDIO_REQUEST_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("STUDIO_REQUEST_TIMEOUT_SECS: not a number: {}", value))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        let tail_policy = match get("STUDIO_STREAM_TAIL") {
            Some(value) => value.parse::<TailPolicy>().context("STUDIO_STREAM_TAIL")?,
            None => TailPolicy::default(),
        };

        Ok(Self {
            api_url: get("STUDIO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            remote_sessions,
            data_dir: get("STUDIO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            request_timeout,
            tail_policy,
        })
    }

    /// Path of the local session database
    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join("sessions.db")
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.api_url.clone(),
            timeout: self.request_timeout,
            ..Default::default()
        }
    }
}

fn default_data_dir() -> PathBuf {
    use directories::ProjectDirs;

    if let Some(proj_dirs) = ProjectDirs::from("com", "script-studio", "script-studio") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".script-studio")
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}
