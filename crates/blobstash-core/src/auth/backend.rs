//! Durable key/value slots for the bearer token.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use keyring::Entry;
use tracing::{debug, warn};

use super::StorageError;

/// Token file name inside the data directory
pub const TOKEN_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "blobstash";

/// Durable storage for string values under fixed keys.
///
/// `read` must return `Ok(None)` for a key that was never written; errors are
/// reserved for failures of the underlying medium.
pub trait TokenBackend: Send + Sync + fmt::Debug {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// File
// ============================================================================

/// JSON object on disk mapping keys to values.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backend storing `session.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Like `read_all`, but a corrupt file counts as empty so the next write
    /// replaces it. I/O failures still propagate.
    fn read_all_replacing_corrupt(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.read_all() {
            Err(StorageError::Corrupt(e)) => {
                debug!(error = %e, path = ?self.path, "Discarding corrupt token file");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, slots: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if slots.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::io(&self.path, e)),
            };
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let contents = serde_json::to_string_pretty(slots)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = open_private(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
            file.write_all(contents.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| StorageError::io(&tmp_path, e))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}

impl TokenBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut slots = self.read_all_replacing_corrupt()?;
        slots.insert(key.to_string(), value.to_string());
        self.write_all(&slots)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut slots = self.read_all_replacing_corrupt()?;
        slots.remove(key);
        self.write_all(&slots)
    }
}

// ============================================================================
// Keyring
// ============================================================================

/// OS keychain entry per key.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBackend for KeyringBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Fallback
// ============================================================================

/// Tries `primary` first and falls back to `secondary` when it fails, e.g. the
/// OS keychain first and the token file when no keychain service is running.
#[derive(Debug)]
pub struct FallbackBackend {
    primary: Box<dyn TokenBackend>,
    secondary: Box<dyn TokenBackend>,
}

impl FallbackBackend {
    pub fn new(
        primary: impl TokenBackend + 'static,
        secondary: impl TokenBackend + 'static,
    ) -> Self {
        Self {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
        }
    }

    /// OS keychain, then `session.json` in `dir`.
    pub fn keyring_then_file(dir: &Path) -> Self {
        Self::new(KeyringBackend::new(), FileBackend::in_dir(dir))
    }
}

impl TokenBackend for FallbackBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.primary.read(key) {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => debug!("Primary token store empty, trying fallback"),
            Err(e) => warn!(error = %e, "Primary token store read failed, trying fallback"),
        }
        self.secondary.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self.primary.write(key, value) {
            Ok(()) => {
                // Drop any older copy so a later primary failure cannot resurrect it
                if let Err(e) = self.secondary.remove(key) {
                    debug!(error = %e, "Could not remove fallback copy of token");
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Primary token store write failed, using fallback");
                // An older primary copy would shadow the fallback on read
                let _ = self.primary.remove(key);
                self.secondary.write(key, value)
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let primary = self.primary.remove(key);
        let secondary = self.secondary.remove(key);
        match (primary, secondary) {
            (Err(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => {
                warn!(error = %e, "Primary token store remove failed");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Process-local slots. Clones share the same slots, so a second store built
/// from a clone sees what the first one persisted.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    slots: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("slots", &self.slots().len())
            .finish()
    }
}

impl TokenBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.slots().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.slots().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.slots().remove(key);
        Ok(())
    }
}
