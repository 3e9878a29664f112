use crate::models::AppConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Prefix for environment overrides, e.g. `CLUBAPP__BACKEND__URL`
pub const ENV_PREFIX: &str = "CLUBAPP";

/// Configuration manager for loading and saving the YAML configuration file.
///
/// Manages `ClubApp Config.yaml` inside the config directory (normally
/// `ClubApp Data/`). [`load_settings`](Self::load_settings) layers
/// environment variables on top of the file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    app_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "ClubApp Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            app_config_path: config_dir.join("ClubApp Config.yaml"),
            config_dir,
        })
    }

    /// Load the configuration file.
    ///
    /// # Returns
    /// The loaded AppConfig, or default if file doesn't exist
    pub fn load_app_config(&self) -> Result<AppConfig> {
        if !self.app_config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.app_config_path
            );
            return Ok(AppConfig::default());
        }

        let file_contents = fs::read_to_string(&self.app_config_path)
            .with_context(|| format!("Failed to read config: {}", self.app_config_path))?;

        let config: AppConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse config: {}", self.app_config_path))?;

        tracing::info!("Loaded config from {}", self.app_config_path);
        Ok(config)
    }

    /// Save the configuration file.
    pub fn save_app_config(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.app_config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.app_config_path))?;

        tracing::info!("Saved config to {}", self.app_config_path);
        Ok(())
    }

    /// Effective settings: the YAML file (optional) overridden by `CLUBAPP__*`
    /// environment variables.
    pub fn load_settings(&self) -> Result<AppConfig> {
        self.load_settings_with_env(None)
    }

    /// Like [`load_settings`](Self::load_settings) but reading overrides from
    /// `env` instead of the process environment when given.
    pub fn load_settings_with_env(
        &self,
        env: Option<config::Map<String, String>>,
    ) -> Result<AppConfig> {
        let settings = config::Config::builder()
            .add_source(
                config::File::new(self.app_config_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to build settings from {}", self.app_config_path))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize settings")?;

        tracing::debug!(
            "Effective settings: backend configured = {}, debug = {}",
            config.backend.is_configured(),
            config.app.debug_mode
        );
        Ok(config)
    }

    /// Location of the local display cache
    pub fn cache_path(&self, config: &AppConfig) -> Utf8PathBuf {
        self.config_dir.join(&config.app.cache_file)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn app_config_path(&self) -> &Utf8Path {
        &self.app_config_path
    }
}
