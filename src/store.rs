//! JSON-file settings store.
//!
//! One flat JSON object per file, written eagerly on every mutation. Holds
//! the server-profile list, the active-profile id, and the last-used base
//! URL. The bearer token is deliberately never written here.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;

/// Storage key for the persisted server-profile list.
pub const SERVERS_KEY: &str = "servers";
/// Storage key for the active profile id.
pub const ACTIVE_SERVER_KEY: &str = "active_server_id";
/// Storage key for the last-used base URL. Predates multi-profile support
/// and is kept in sync for older builds reading the same file.
pub const SERVER_URL_KEY: &str = "server_url";

pub struct SettingsStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl SettingsStore {
    /// Open the store at `path`. A missing or unreadable file yields an
    /// empty store rather than an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("settings file {} is corrupt, starting empty: {e}", path.display());
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.lock().unwrap();
        values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut values = self.values.lock().unwrap();
        values.insert(key.to_owned(), serde_json::to_value(value)?);
        self.save(&values)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap();
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }

    fn save(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
