//! Application settings management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::context::Role;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// General settings
    #[serde(default)]
    pub general: GeneralSettings,

    /// Backend integration profile
    #[serde(default)]
    pub backend: BackendSettings,

    /// Track visibility policy
    #[serde(default)]
    pub tracks: TrackSettings,

    /// Loop playback defaults
    #[serde(default)]
    pub looping: LoopSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Data directory for the local store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which backend the sync layer talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Everything stays in the local SQLite store
    #[default]
    Local,
    /// Annotations REST API
    Rest,
    /// REST API fronted by the Opencast search service
    Opencast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Backend profile (local, rest, opencast)
    #[serde(default)]
    pub profile: Profile,

    /// Base URL of the annotations API
    #[serde(default)]
    pub api_base: String,

    /// Current user id (empty = anonymous)
    #[serde(default)]
    pub user_id: String,

    /// Current user nickname
    #[serde(default)]
    pub nickname: String,

    /// Current user email
    #[serde(default)]
    pub email: String,

    /// Current user role (user, administrator, supervisor)
    #[serde(default)]
    pub role: Role,

    /// Auth token sent alongside the user id
    #[serde(default)]
    pub auth_token: String,

    /// Signed media URL (opencast profile)
    #[serde(default)]
    pub signed_url: String,

    /// Media package id (opencast profile)
    #[serde(default)]
    pub media_package_id: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Items requested per page when fetching collections
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackSettings {
    /// Maximum number of simultaneously visible tracks (unset = unbounded)
    #[serde(default)]
    pub max_visible_tracks: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Number of windows the default loop length aims for
    #[serde(default = "default_loop_count")]
    pub default_loop_count: u32,

    /// Shortest default loop length in seconds
    #[serde(default = "default_minimal_loop")]
    pub minimal_loop: f64,

    /// Restrict new annotations to the current loop window
    #[serde(default)]
    pub constrain_annotations: bool,
}

// Default value functions

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("org", "annotool", "annotool")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.local/share/annotool"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    50
}

fn default_loop_count() -> u32 {
    10
}

fn default_minimal_loop() -> f64 {
    5.0
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            api_base: String::new(),
            user_id: String::new(),
            nickname: String::new(),
            email: String::new(),
            role: Role::default(),
            auth_token: String::new(),
            signed_url: String::new(),
            media_package_id: String::new(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            default_loop_count: default_loop_count(),
            minimal_loop: default_minimal_loop(),
            constrain_annotations: false,
        }
    }
}

impl TrackSettings {
    /// Effective visible-track cap
    pub fn visible_cap(&self) -> usize {
        self.max_visible_tracks.unwrap_or(usize::MAX)
    }
}

impl Settings {
    /// Load settings from the configuration file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("No config file found, using defaults");
            let mut settings = Self::default();
            settings.apply_env_overrides();
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut settings = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if self.backend.auth_token.trim().is_empty() {
            if let Ok(token) = std::env::var("ANNOTOOL_AUTH_TOKEN") {
                if !token.trim().is_empty() {
                    self.backend.auth_token = token;
                }
            }
        }

        if let Ok(base) = std::env::var("ANNOTOOL_API_BASE") {
            if !base.trim().is_empty() {
                self.backend.api_base = base;
            }
        }
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "annotool", "annotool")
            .context("Could not determine config directory")?;

        let config_dir = dirs.config_dir();
        Ok(config_dir.join("config.toml"))
    }

    /// Write default configuration to a file
    pub fn write_default(path: &PathBuf) -> Result<()> {
        let settings = Self::default();
        let content = toml::to_string_pretty(&settings)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the local store database path
    pub fn database_path(&self) -> PathBuf {
        self.general.data_dir.join("annotool.db")
    }

    /// API base without a trailing slash
    pub fn api_base(&self) -> &str {
        self.backend.api_base.trim().trim_end_matches('/')
    }
}
