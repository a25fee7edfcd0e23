use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{HttpOptions, DEFAULT_USER_AGENT};
use crate::gate::ReleaseOrder;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Wait between attempts in seconds (e.g. 0.5 = 500ms).
    pub wait_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_attempts: p.max_attempts,
            wait_secs: p.wait.as_secs_f64(),
        }
    }
}

impl RetryConfig {
    /// Policy with invalid values clamped (attempts >= 1, wait >= 0).
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs_f64(self.max_attempts, self.wait_secs)
    }
}

/// HTTP transfer settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for one attempt, in seconds.
    pub timeout_secs: u64,
    /// Receive buffer size hint in bytes (None = library default).
    #[serde(default)]
    pub buffer_size: Option<usize>,
    /// Replace destination files that already exist.
    #[serde(default)]
    pub overwrite_existing: bool,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 30,
            timeout_secs: 3600,
            buffer_size: None,
            overwrite_existing: false,
            headers: BTreeMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn to_http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            buffer_size: self.buffer_size,
            overwrite_existing: self.overwrite_existing,
            headers: self.headers.clone(),
        }
    }
}

/// Global configuration loaded from `~/.config/dlq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    /// Maximum number of concurrent downloads.
    pub capacity: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Order in which held requests get freed slots: "fifo" (default) or "lifo".
    #[serde(default)]
    pub release_order: Option<ReleaseOrder>,
    /// Optional HTTP settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            retry: None,
            release_order: None,
            fetch: None,
        }
    }
}

impl DlqConfig {
    /// Capacity clamped to at least one slot.
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }

    pub fn effective_release_order(&self) -> ReleaseOrder {
        self.release_order.unwrap_or_default()
    }

    pub fn http_options(&self) -> HttpOptions {
        self.fetch
            .clone()
            .unwrap_or_default()
            .to_http_options()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DlqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DlqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
