use serde::{Deserialize, Serialize};

/// Application configuration from `ClubApp Config.yaml`.
///
/// Every field has a default so a partial file (or none at all) still loads.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendSettings,
    pub app: AppSettings,
}

/// Connection settings for the hosted backend.
///
/// An empty `url` runs the app against the in-memory demo backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub debug_mode: bool,
    pub log_dir: String,
    pub cache_file: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            log_dir: "logs".to_string(),
            cache_file: "cache.json".to_string(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}
