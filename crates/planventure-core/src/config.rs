//! Application configuration.
//!
//! Configuration comes from the environment (front ends load `.env` first):
//!
//! - `PLANVENTURE_API_BASE_URL`: API address, default `http://localhost:5000`
//! - `PLANVENTURE_STORAGE`: `file` (default), `keyring` or `memory`
//! - `PLANVENTURE_DATA_DIR`: where the file store keeps its entries,
//!   default `<cache dir>/planventure`

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;

use crate::auth::{CredentialStore, FileStore, KeyringStore, MemoryStore};

/// Application name used for the data directory path
const APP_NAME: &str = "planventure";

/// API address used when no override is configured (local dev server)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

const API_BASE_URL_VAR: &str = "PLANVENTURE_API_BASE_URL";
const STORAGE_VAR: &str = "PLANVENTURE_STORAGE";
const DATA_DIR_VAR: &str = "PLANVENTURE_DATA_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" | "keychain" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown storage backend {:?} (expected file, keyring or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base address without a trailing slash
    pub api_base_url: String,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_url = non_empty(API_BASE_URL_VAR).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Url::parse(&raw_url)
            .with_context(|| format!("Invalid {}: {}", API_BASE_URL_VAR, raw_url))?;
        let api_base_url = raw_url.trim_end_matches('/').to_string();

        let storage = match non_empty(STORAGE_VAR) {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid {}", STORAGE_VAR))?,
            None => StorageBackend::default(),
        };

        let data_dir = match non_empty(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => Self::default_data_dir(),
        };

        Ok(Self {
            api_base_url,
            storage,
            data_dir,
        })
    }

    fn default_data_dir() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"))
    }

    /// Open the configured credential store.
    pub fn open_store(&self) -> Result<Arc<dyn CredentialStore>> {
        let store: Arc<dyn CredentialStore> = match self.storage {
            StorageBackend::File => Arc::new(
                FileStore::new(self.data_dir.clone()).with_context(|| {
                    format!("Failed to open credential store at {}", self.data_dir.display())
                })?,
            ),
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::default(),
            data_dir: Self::default_data_dir(),
        }
    }
}
