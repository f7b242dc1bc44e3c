//! Per-device PIN storage.
//!
//! PINs are remembered after a successful pairing so later sessions and model A
//! updates can authenticate without asking again.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[cfg(test)]
use mockall::automock;

use crate::error::UpdateResult;

/// Storage for device PINs, keyed by link address.
#[cfg_attr(test, automock)]
pub trait CredentialStore: Send + Sync {
    /// Stored PIN for `address`, if any.
    fn get(&self, address: &str) -> UpdateResult<Option<String>>;

    /// Store or replace the PIN for `address`.
    fn put(&self, address: &str, pin: &str) -> UpdateResult<()>;
}

/// Credentials file name stored in the data directory.
const CREDENTIALS_FILENAME: &str = "device_credentials.json";

/// Stores PINs in a JSON object on disk.
pub struct FileCredentialStore {
    credentials_file_path: PathBuf,
    // Serializes read-modify-write in put()
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store in the given data directory.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            credentials_file_path: data_dir.join(CREDENTIALS_FILENAME),
            lock: Mutex::new(()),
        }
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_file_path
    }

    fn load_all(&self) -> UpdateResult<BTreeMap<String, String>> {
        if !self.credentials_file_path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.credentials_file_path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    fn save_all(&self, entries: &BTreeMap<String, String>) -> UpdateResult<()> {
        if let Some(parent) = self.credentials_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        fs::write(&self.credentials_file_path, contents)?;
        Ok(())
    }
}

fn key(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, address: &str) -> UpdateResult<Option<String>> {
        Ok(self.load_all()?.remove(&key(address)))
    }

    fn put(&self, address: &str, pin: &str) -> UpdateResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load_all()?;
        entries.insert(key(address), pin.to_string());
        self.save_all(&entries)
    }
}
