//! Client configuration
//!
//! Values are resolved from built-in defaults, then an optional JSON file,
//! then `DEALFLOW_*` environment variables. Every interval the clients use
//! (debounce, retry, initial connect delay) lives here rather than in code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::search::SearchResultType;

pub const ENV_API_URL: &str = "DEALFLOW_API_URL";
pub const ENV_STREAM_DOMAIN: &str = "DEALFLOW_STREAM_DOMAIN";
pub const ENV_DISABLE_STREAMS: &str = "DEALFLOW_DISABLE_STREAMS";
pub const ENV_TIMEOUT_SECS: &str = "DEALFLOW_TIMEOUT_SECS";

/// Settings shared by the search and notification clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
  /// Base URL of the CRM backend (e.g. "http://localhost:4000/api")
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Path segment the event streams live under
  #[serde(default = "default_stream_domain")]
  pub stream_domain: String,
  /// Timeout for ordinary JSON requests, in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Quiet period after the last keystroke before a search is dispatched
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  /// How often the supervisor re-attempts dropped subscriptions
  #[serde(default = "default_retry_interval_secs")]
  pub retry_interval_secs: u64,
  /// Delay before the first subscription attempt
  #[serde(default = "default_initial_delay_ms")]
  pub initial_delay_ms: u64,
  #[serde(default = "default_search_limit")]
  pub search_limit: usize,
  #[serde(default = "default_search_types")]
  pub search_types: Vec<SearchResultType>,
  /// Kill switch: when set, no stream subscription is ever attempted
  #[serde(default)]
  pub streams_disabled: bool,
  #[serde(default = "default_toast_duration_ms")]
  pub toast_duration_ms: u64,
}

fn default_base_url() -> String {
  "http://localhost:4000/api".to_string()
}
fn default_stream_domain() -> String {
  "whatsapp".to_string()
}
fn default_timeout_secs() -> u64 {
  30
}
fn default_debounce_ms() -> u64 {
  300
}
fn default_retry_interval_secs() -> u64 {
  30
}
fn default_initial_delay_ms() -> u64 {
  1000
}
fn default_search_limit() -> usize {
  20
}
fn default_search_types() -> Vec<SearchResultType> {
  SearchResultType::ALL.to_vec()
}
fn default_toast_duration_ms() -> u64 {
  4000
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      stream_domain: default_stream_domain(),
      timeout_secs: default_timeout_secs(),
      debounce_ms: default_debounce_ms(),
      retry_interval_secs: default_retry_interval_secs(),
      initial_delay_ms: default_initial_delay_ms(),
      search_limit: default_search_limit(),
      search_types: default_search_types(),
      streams_disabled: false,
      toast_duration_ms: default_toast_duration_ms(),
    }
  }
}

impl ClientConfig {
  /// Load configuration from a JSON file; missing fields take their defaults
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let content = std::fs::read_to_string(path)?;
    let config: ClientConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
  }

  /// Defaults overlaid with the process environment
  pub fn from_env() -> Result<Self> {
    Self::default().with_overrides(|key| std::env::var(key).ok())
  }

  /// Apply `DEALFLOW_*` overrides looked up through `lookup`
  pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(url) = lookup(ENV_API_URL) {
      self.base_url = url;
    }
    if let Some(domain) = lookup(ENV_STREAM_DOMAIN) {
      self.stream_domain = domain;
    }
    if let Some(flag) = lookup(ENV_DISABLE_STREAMS) {
      self.streams_disabled = parse_flag(ENV_DISABLE_STREAMS, &flag)?;
    }
    if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
      self.timeout_secs = secs
        .trim()
        .parse()
        .map_err(|_| ClientError::config(format!("{ENV_TIMEOUT_SECS} must be a number, got '{secs}'")))?;
    }

    self.validate()?;
    Ok(self)
  }

  pub fn validate(&self) -> Result<()> {
    url::Url::parse(&self.base_url)?;
    if self.stream_domain.trim_matches('/').is_empty() {
      return Err(ClientError::config("stream_domain must not be empty"));
    }
    if self.retry_interval_secs == 0 {
      return Err(ClientError::config("retry_interval_secs must be greater than zero"));
    }
    Ok(())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn retry_interval(&self) -> Duration {
    Duration::from_secs(self.retry_interval_secs)
  }

  pub fn initial_delay(&self) -> Duration {
    Duration::from_millis(self.initial_delay_ms)
  }

  pub fn toast_duration(&self) -> Duration {
    Duration::from_millis(self.toast_duration_ms)
  }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Ok(true),
    "" | "0" | "false" | "no" | "off" => Ok(false),
    other => Err(ClientError::config(format!("{name} must be a boolean flag, got '{other}'"))),
  }
}
