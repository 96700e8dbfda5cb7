use crate::{
    domain::{Principal, SortCategory, SortDirection},
    ports::{AppConfig, Backend, ConfigError, ConfigResult, ConfigStore},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

const KEYRING_SERVICE: &str = "taskdeck";
const SESSION_ENTRY: &str = "session";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    backend: Option<Backend>,
    remote_url: Option<String>,
    anon_key: Option<String>,
    data_file: Option<PathBuf>,
    persist_timeout_seconds: Option<u64>,
    default_sort: Option<SortCategory>,
    default_direction: Option<SortDirection>,
}

pub struct FileConfigStore {
    config_dir: PathBuf,
    use_keyring: bool,
}

impl FileConfigStore {
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::ReadError("Cannot determine config directory".to_string())
        })?;

        Ok(Self {
            config_dir: config_dir.join("taskdeck"),
            use_keyring: true,
        })
    }

    /// Config rooted at `dir`, with the session kept in a file instead of the keyring.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
            use_keyring: false,
        }
    }

    fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    fn session_file_path(&self) -> PathBuf {
        self.config_dir.join(".session")
    }

    async fn ensure_config_dir(&self) -> ConfigResult<()> {
        fs::create_dir_all(&self.config_dir)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    fn keyring_entry(&self) -> Option<keyring::Entry> {
        if !self.use_keyring {
            return None;
        }
        match keyring::Entry::new(KEYRING_SERVICE, SESSION_ENTRY) {
            Ok(entry) => Some(entry),
            Err(_) => {
                tracing::warn!("Keyring service not available, falling back to file storage");
                None
            }
        }
    }

    async fn read_session_file(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(self.session_file_path()).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError(e.to_string())),
        }
    }

    async fn write_session_file(&self, content: &str) -> ConfigResult<()> {
        self.ensure_config_dir().await?;
        let session_path = self.session_file_path();
        fs::write(&session_path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&session_path)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&session_path, perms)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_config(&self) -> ConfigResult<AppConfig> {
        let config_file = match fs::read_to_string(self.config_path()).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?,
            Err(_) => ConfigFile::default(),
        };

        let defaults = AppConfig::default();
        let mut config = AppConfig {
            backend: config_file.backend.unwrap_or(defaults.backend),
            remote_url: config_file.remote_url,
            anon_key: config_file.anon_key,
            data_file: config_file.data_file,
            persist_timeout_seconds: config_file
                .persist_timeout_seconds
                .unwrap_or(defaults.persist_timeout_seconds),
            default_sort: config_file.default_sort.unwrap_or(defaults.default_sort),
            default_direction: config_file
                .default_direction
                .unwrap_or(defaults.default_direction),
        };

        if let Ok(url) = std::env::var("TASKDECK_URL") {
            config.remote_url = Some(url);
        }
        if let Ok(key) = std::env::var("TASKDECK_ANON_KEY") {
            config.anon_key = Some(key);
        }

        Ok(config)
    }

    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()> {
        self.ensure_config_dir().await?;

        let config_file = ConfigFile {
            backend: Some(config.backend),
            remote_url: config.remote_url.clone(),
            anon_key: config.anon_key.clone(),
            data_file: config.data_file.clone(),
            persist_timeout_seconds: Some(config.persist_timeout_seconds),
            default_sort: Some(config.default_sort),
            default_direction: Some(config.default_direction),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        fs::write(self.config_path(), content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    async fn load_session(&self) -> ConfigResult<Option<Principal>> {
        let mut raw = None;
        if let Some(entry) = self.keyring_entry() {
            match entry.get_password() {
                Ok(secret) => raw = Some(secret),
                Err(keyring::Error::NoEntry) => {}
                Err(_) => {
                    tracing::warn!("Keyring not available, falling back to file storage");
                }
            }
        }

        let raw = match raw {
            Some(raw) => Some(raw),
            None => self.read_session_file().await?,
        };

        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
        })
        .transpose()
    }

    async fn save_session(&self, principal: &Principal) -> ConfigResult<()> {
        let content = serde_json::to_string(principal)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        if let Some(entry) = self.keyring_entry() {
            match entry.set_password(&content) {
                Ok(()) => return Ok(()),
                Err(_) => {
                    tracing::warn!("Failed to store in keyring, falling back to file storage");
                }
            }
        }

        self.write_session_file(&content).await
    }

    async fn clear_session(&self) -> ConfigResult<()> {
        if let Some(entry) = self.keyring_entry() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => tracing::warn!("Failed to clear keyring session: {}", e),
            }
        }

        match fs::remove_file(self.session_file_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::WriteError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_config_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::with_dir(dir.path());

        let config = store.load_config().await.unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.persist_timeout_seconds, 30);
        assert_eq!(config.default_sort, SortCategory::CreatedAt);
        assert_eq!(config.default_direction, SortDirection::Desc);
    }

    #[tokio::test]
    async fn config_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::with_dir(dir.path());
        let config = AppConfig {
            backend: Backend::Remote,
            persist_timeout_seconds: 5,
            default_sort: SortCategory::DueDate,
            default_direction: SortDirection::Asc,
            ..Default::default()
        };

        store.save_config(&config).await.unwrap();
        let loaded = store.load_config().await.unwrap();
        assert_eq!(loaded.backend, Backend::Remote);
        assert_eq!(loaded.persist_timeout_seconds, 5);
        assert_eq!(loaded.default_sort, SortCategory::DueDate);
        assert_eq!(loaded.default_direction, SortDirection::Asc);
    }

    #[tokio::test]
    async fn session_falls_back_to_file() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::with_dir(dir.path());
        let principal = Principal {
            user_id: UserId::from("u1"),
            email: Some("me@example.com".to_string()),
            access_token: "secret".to_string(),
        };

        assert_eq!(store.load_session().await.unwrap(), None);
        store.save_session(&principal).await.unwrap();
        assert_eq!(store.load_session().await.unwrap(), Some(principal));

        store.clear_session().await.unwrap();
        assert_eq!(store.load_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_config_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "not json")
            .await
            .unwrap();
        let store = FileConfigStore::with_dir(dir.path());

        assert!(matches!(
            store.load_config().await,
            Err(ConfigError::InvalidFormat(_))
        ));
    }
}
