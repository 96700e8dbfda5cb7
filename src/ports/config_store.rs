use crate::domain::{Principal, SortCategory, SortDirection};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    ReadError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(String),

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    Remote,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "remote" => Ok(Backend::Remote),
            other => Err(ConfigError::InvalidFormat(format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: Backend,
    pub remote_url: Option<String>,
    pub anon_key: Option<String>,
    pub data_file: Option<PathBuf>,
    pub persist_timeout_seconds: u64,
    pub default_sort: SortCategory,
    pub default_direction: SortDirection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            remote_url: None,
            anon_key: None,
            data_file: None,
            persist_timeout_seconds: 30,
            default_sort: SortCategory::CreatedAt,
            default_direction: SortDirection::Desc,
        }
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_config(&self) -> ConfigResult<AppConfig>;
    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()>;
    async fn load_session(&self) -> ConfigResult<Option<Principal>>;
    async fn save_session(&self, principal: &Principal) -> ConfigResult<()>;
    async fn clear_session(&self) -> ConfigResult<()>;
}
