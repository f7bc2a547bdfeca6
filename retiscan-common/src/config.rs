//! Configuration loading and resolution
//!
//! Every setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it is logged and the
//! remaining tiers are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const ENV_ROOT_FOLDER: &str = "RETISCAN_ROOT_FOLDER";
pub const ENV_PREDICT_URL: &str = "RETISCAN_PREDICT_URL";
pub const ENV_BACKEND_URL: &str = "RETISCAN_BACKEND_URL";
pub const ENV_BACKEND_KEY: &str = "RETISCAN_BACKEND_KEY";
pub const ENV_BACKEND_MODE: &str = "RETISCAN_BACKEND_MODE";

const DATABASE_FILE: &str = "retiscan.db";
const SESSION_FILE: &str = "session.json";

/// Where predictions and accounts live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Hosted auth + REST data API
    Hosted,
    /// SQLite database in the root folder
    #[default]
    Local,
}

impl std::str::FromStr for BackendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(BackendMode::Hosted),
            "local" => Ok(BackendMode::Local),
            other => Err(Error::Config(format!(
                "Unknown backend mode '{}' (expected 'hosted' or 'local')",
                other
            ))),
        }
    }
}

/// Compiled defaults used when no other tier supplies a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub predict_url: String,
    pub timeout_secs: u64,
    pub log_level: String,
    pub max_image_bytes: u64,
    pub redirect_url: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            predict_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 60,
            log_level: "info".to_string(),
            max_image_bytes: 20 * 1024 * 1024,
            redirect_url: "http://localhost:8080/".to_string(),
        }
    }
}

/// OS-dependent default data folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("retiscan"))
        .unwrap_or_else(|| PathBuf::from("./retiscan_data"))
}

/// Default config file path (`<config dir>/retiscan/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("retiscan").join("config.toml"))
}

// ========================================
// TOML file
// ========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub prediction: PredictionSection,
    pub backend: BackendSection,
    pub logging: LoggingConfig,
    pub upload: UploadSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSection {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub mode: Option<BackendMode>,
    pub url: Option<String>,
    pub anon_key: Option<String>,
    /// Where the identity provider sends the browser after social sign-in
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub max_image_bytes: Option<u64>,
}

/// Read a TOML config file
///
/// Returns `Ok(None)` when the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        debug!("No config file at {}", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    Ok(Some(config))
}

// ========================================
// Resolved configuration
// ========================================

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub predict_url: Option<String>,
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub backend_mode: Option<BackendMode>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PredictionSettings {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub mode: BackendMode,
    /// Set whenever `mode` is `Hosted`
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub redirect_url: String,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub root_folder: PathBuf,
    pub prediction: PredictionSettings,
    pub backend: BackendSettings,
    pub log_level: String,
    pub max_image_bytes: u64,
}

impl AppConfig {
    /// Resolve from CLI overrides, the process environment and the TOML file
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let toml_path = overrides.config_path.clone().or_else(default_config_path);
        let toml = match toml_path {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        Self::resolve_with(overrides, |key| std::env::var(key).ok(), toml.unwrap_or_default())
    }

    /// Resolve with an explicit environment lookup and TOML content
    pub fn resolve_with<F>(overrides: &Overrides, env: F, toml: TomlConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CompiledDefaults::for_current_platform();
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let root_folder = overrides
            .root_folder
            .clone()
            .or_else(|| lookup(ENV_ROOT_FOLDER).map(PathBuf::from))
            .or(toml.root_folder)
            .unwrap_or(defaults.root_folder);

        let base_url = overrides
            .predict_url
            .clone()
            .or_else(|| lookup(ENV_PREDICT_URL))
            .or(toml.prediction.base_url)
            .unwrap_or(defaults.predict_url);

        let timeout_secs = match toml.prediction.timeout_secs {
            Some(0) => {
                warn!(
                    "[prediction].timeout_secs = 0 would fail every request; using {}s",
                    defaults.timeout_secs
                );
                defaults.timeout_secs
            }
            Some(secs) => secs,
            None => defaults.timeout_secs,
        };

        let mode = match overrides.backend_mode {
            Some(mode) => mode,
            None => match lookup(ENV_BACKEND_MODE) {
                Some(value) => value.parse()?,
                None => toml.backend.mode.unwrap_or_default(),
            },
        };

        let url = overrides
            .backend_url
            .clone()
            .or_else(|| lookup(ENV_BACKEND_URL))
            .or(toml.backend.url);
        let anon_key = overrides
            .backend_key
            .clone()
            .or_else(|| lookup(ENV_BACKEND_KEY))
            .or(toml.backend.anon_key);

        if mode == BackendMode::Hosted {
            if url.is_none() {
                return Err(Error::Config(format!(
                    "Hosted backend selected but no URL configured (set {} or [backend].url)",
                    ENV_BACKEND_URL
                )));
            }
            if anon_key.is_none() {
                return Err(Error::Config(format!(
                    "Hosted backend selected but no API key configured (set {} or [backend].anon_key)",
                    ENV_BACKEND_KEY
                )));
            }
        }

        let log_level = overrides
            .log_level
            .clone()
            .or(toml.logging.level)
            .unwrap_or(defaults.log_level);

        Ok(Self {
            root_folder,
            prediction: PredictionSettings {
                base_url: trim_base_url(&base_url),
                timeout: Duration::from_secs(timeout_secs),
            },
            backend: BackendSettings {
                mode,
                url: url.map(|u| trim_base_url(&u)),
                anon_key,
                redirect_url: toml.backend.redirect_url.unwrap_or(defaults.redirect_url),
            },
            log_level,
            max_image_bytes: toml.upload.max_image_bytes.unwrap_or(defaults.max_image_bytes),
        })
    }

    /// Local SQLite database path
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Saved session token path
    pub fn session_path(&self) -> PathBuf {
        self.root_folder.join(SESSION_FILE)
    }

    /// Create the root folder if missing
    pub fn ensure_root_folder(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            debug!("Created root folder {}", self.root_folder.display());
        }
        Ok(())
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
