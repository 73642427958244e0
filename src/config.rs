use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_DATA_DIR: &str = ".billsplit";
pub const CONFIG_FILE: &str = "config.yaml";

/// Runtime configuration.
///
/// Built from defaults, then `<data_dir>/config.yaml` if present, then the
/// environment. CLI flags are applied last by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub bind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Images above this many bytes are downscaled before upload.
    pub max_image_bytes: usize,
    pub jpeg_quality: u8,
    /// Only ever read from the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            server: ServerConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5001".to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4-turbo".to_string(),
            max_tokens: 1000,
            timeout_secs: 60,
            max_image_bytes: 15 * 1024 * 1024,
            jpeg_quality: 85,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration for the current process.
    ///
    /// `.env` in the working directory is read first, so its values take
    /// part in the environment layer.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let data_dir = std::env::var("BILLSPLIT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        Self::load_from(&data_dir, |key| std::env::var(key).ok())
    }

    /// Layer the config file in `data_dir` and the variables returned by
    /// `env` over the defaults.
    pub fn load_from(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            debug!("Reading config from {}", path.display());
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(&raw)?
            }
        } else {
            Config::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.apply_env(env);
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = set("OPENAI_API_KEY") {
            self.extraction.api_key = Some(key);
        }
        if let Some(model) = set("BILLSPLIT_MODEL") {
            self.extraction.model = model;
        }
        if let Some(bind) = set("BILLSPLIT_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
