use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_fps: f64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Base URL of the external auth server. Falls back to `api_base_url`.
    #[serde(default)]
    pub auth_base_url: Option<String>,
    #[serde(default = "default_post_batch_size")]
    pub post_batch_size: usize,
    #[serde(default = "default_user_batch_size")]
    pub user_batch_size: usize,
    #[serde(default = "default_post_debounce_ms")]
    pub post_debounce_ms: u64,
    #[serde(default = "default_user_debounce_ms")]
    pub user_debounce_ms: u64,
    #[serde(default = "default_near_bottom_items")]
    pub near_bottom_items: usize,
    #[serde(default = "default_renewal_interval_mins")]
    pub renewal_interval_mins: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub default_view: DefaultView,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultView {
    #[default]
    Feed,
    Explore,
    Profile,
}

fn default_tick_rate() -> f64 {
    30.0
}

fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_post_batch_size() -> usize {
    5
}

fn default_user_batch_size() -> usize {
    10
}

fn default_post_debounce_ms() -> u64 {
    120
}

fn default_user_debounce_ms() -> u64 {
    200
}

fn default_near_bottom_items() -> usize {
    3
}

// Access tokens are issued for 60 minutes.
fn default_renewal_interval_mins() -> u64 {
    55
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate_fps: default_tick_rate(),
            api_base_url: default_api_base_url(),
            auth_base_url: None,
            post_batch_size: default_post_batch_size(),
            user_batch_size: default_user_batch_size(),
            post_debounce_ms: default_post_debounce_ms(),
            user_debounce_ms: default_user_debounce_ms(),
            near_bottom_items: default_near_bottom_items(),
            renewal_interval_mins: default_renewal_interval_mins(),
            request_timeout_secs: default_request_timeout_secs(),
            default_view: DefaultView::default(),
        }
    }
}

impl AppConfig {
    pub fn auth_base_url(&self) -> &str {
        self.auth_base_url.as_deref().unwrap_or(&self.api_base_url)
    }

    pub fn renewal_interval(&self) -> Duration {
        Duration::from_secs(self.renewal_interval_mins.max(1) * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn post_debounce(&self) -> Duration {
        Duration::from_millis(self.post_debounce_ms)
    }

    pub fn user_debounce(&self) -> Duration {
        Duration::from_millis(self.user_debounce_ms)
    }

    /// Apply `FIXIT_API_URL` / `FIXIT_AUTH_URL` overrides from the environment.
    fn apply_env(&mut self) {
        let get = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(url) = get("FIXIT_API_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = get("FIXIT_AUTH_URL") {
            self.auth_base_url = Some(url);
        }
    }
}

/// Directory holding config, `.env` and persisted session data.
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/fixit")
}

fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Return candidate .env paths in priority order.
fn env_file_paths() -> Vec<PathBuf> {
    vec![config_dir().join(".env"), PathBuf::from(".env")]
}

/// Load .env files without overriding variables already set in the environment.
pub fn load_env_files() {
    for path in env_file_paths() {
        if path.exists()
            && let Err(e) = dotenvy::from_path(&path)
        {
            tracing::warn!(path = %path.display(), "failed to load .env file: {e}");
        }
    }
}

fn parse_config(contents: &str) -> AppConfig {
    toml::from_str(contents).unwrap_or_else(|e| {
        tracing::warn!("invalid config.toml, using defaults: {e}");
        AppConfig::default()
    })
}

pub fn load_config() -> AppConfig {
    load_env_files();

    let mut config = match fs::read_to_string(config_path()) {
        Ok(contents) => parse_config(&contents),
        Err(_) => AppConfig::default(),
    };
    config.apply_env();
    config
}
