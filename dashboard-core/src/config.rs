use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{query::TriggerMode, source::DatasetId};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_ICON_BASE_URL: &str = "https://openweathermap.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Effective settings for a single dataset backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub base_url: String,
    pub mode: TriggerMode,

    /// Only used in live mode.
    pub debounce_ms: u64,

    /// Initial query parameter, e.g. "India" or "IBM".
    pub default_query: Option<String>,

    /// Fetch `default_query` as soon as the dataset is opened.
    pub fetch_on_start: bool,
}

impl DatasetConfig {
    /// Built-in settings for `id`, before any config file overrides.
    pub fn builtin(id: DatasetId) -> Self {
        match id {
            DatasetId::Weather => Self {
                base_url: DEFAULT_BASE_URL.to_string(),
                mode: TriggerMode::Submit,
                debounce_ms: DEFAULT_DEBOUNCE_MS,
                default_query: Some("India".to_string()),
                fetch_on_start: false,
            },
            DatasetId::Stock => Self {
                base_url: DEFAULT_BASE_URL.to_string(),
                mode: TriggerMode::Live,
                debounce_ms: DEFAULT_DEBOUNCE_MS,
                default_query: Some("IBM".to_string()),
                fetch_on_start: true,
            },
        }
    }

    /// Apply the fields `overrides` sets; everything else stays as is.
    pub fn with_overrides(mut self, overrides: &DatasetOverrides) -> Self {
        if let Some(base_url) = &overrides.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(debounce_ms) = overrides.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        if let Some(default_query) = &overrides.default_query {
            self.default_query = Some(default_query.clone());
        }
        if let Some(fetch_on_start) = overrides.fetch_on_start {
            self.fetch_on_start = fetch_on_start;
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// One `[datasets.<id>]` table. Unset keys keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TriggerMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_on_start: Option<bool>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound on a single backend request. Must be non-zero.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Abort the in-flight task when a newer request for the same dataset starts.
    #[serde(default)]
    pub abort_superseded: bool,

    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    /// Example TOML:
    /// [datasets.stock]
    /// base_url = "http://localhost:5000"
    /// mode = "submit"
    #[serde(default)]
    pub datasets: HashMap<String, DatasetOverrides>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            abort_superseded: false,
            icon_base_url: DEFAULT_ICON_BASE_URL.to_string(),
            datasets: HashMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_icon_base_url() -> String {
    DEFAULT_ICON_BASE_URL.to_string()
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }

        for key in self.datasets.keys() {
            DatasetId::try_from(key.as_str())?;
        }

        Ok(())
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-finance", "dashboard")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Built-in settings for a dataset with its config table applied on top.
    pub fn dataset_config(&self, id: DatasetId) -> DatasetConfig {
        let builtin = DatasetConfig::builtin(id);
        match self.datasets.get(id.as_str()) {
            Some(overrides) => builtin.with_overrides(overrides),
            None => builtin,
        }
    }

    pub fn is_dataset_configured(&self, id: DatasetId) -> bool {
        self.datasets.contains_key(id.as_str())
    }

    /// The config table for a dataset, created empty if missing.
    pub fn dataset_overrides_mut(&mut self, id: DatasetId) -> &mut DatasetOverrides {
        self.datasets.entry(id.as_str().to_string()).or_default()
    }

    /// Convenience helper: set/replace the backend base URL for a dataset.
    pub fn upsert_base_url(&mut self, id: DatasetId, base_url: String) {
        self.dataset_overrides_mut(id).base_url = Some(base_url);
    }

    pub fn set_mode(&mut self, id: DatasetId, mode: TriggerMode) {
        self.dataset_overrides_mut(id).mode = Some(mode);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
