use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use super::{StorageError, TokenBackend};

/// Storage key the bearer token is kept under.
pub const TOKEN_KEY: &str = "auth_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated,
}

/// Single-slot bearer token store.
///
/// The durable backend is written first and the in-memory value updated only
/// once that write succeeds, so the two agree whenever a call returns.
/// Clone is cheap; clones share the slot. Concurrent `save`/`clear` calls are
/// serialized: the last one to run decides both the durable and the
/// in-memory value.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Box<dyn TokenBackend>,
    key: String,
    /// Held across a backend operation and the matching `current` update
    writer: Mutex<()>,
    current: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Create a store over `backend`. Starts anonymous until [`load`](Self::load).
    pub fn new(backend: impl TokenBackend + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn TokenBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                key: TOKEN_KEY.to_string(),
                writer: Mutex::new(()),
                current: RwLock::new(None),
            }),
        }
    }

    /// Read the persisted token into memory and return it.
    ///
    /// A missing token is not an error. Backend failures are logged and
    /// treated as absent.
    pub fn load(&self) -> Option<String> {
        let _writer = self.lock_writer();
        let token = match self.inner.backend.read(&self.inner.key) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token, starting anonymous");
                None
            }
        };
        debug!(found = token.is_some(), "Token loaded");
        *self.write_current() = token.clone();
        token
    }

    /// Persist `token`, then make it current.
    pub fn save(&self, token: &str) -> Result<(), StorageError> {
        let _writer = self.lock_writer();
        self.inner.backend.write(&self.inner.key, token)?;
        *self.write_current() = Some(token.to_string());
        debug!("Token saved");
        Ok(())
    }

    /// Remove the persisted token, then forget it.
    pub fn clear(&self) -> Result<(), StorageError> {
        let _writer = self.lock_writer();
        self.inner.backend.remove(&self.inner.key)?;
        *self.write_current() = None;
        debug!("Token cleared");
        Ok(())
    }

    /// The current token, if one is held and non-empty.
    pub fn token(&self) -> Option<String> {
        self.read_current()
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_current().as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn state(&self) -> AuthState {
        if self.is_authenticated() {
            AuthState::Authenticated
        } else {
            AuthState::Anonymous
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.inner
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_current(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.inner
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_current(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.inner
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("backend", &self.inner.backend)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{FileBackend, MemoryBackend};

    /// Backend whose every operation fails, for exercising error paths.
    #[derive(Debug)]
    struct BrokenBackend;

    impl TokenBackend for BrokenBackend {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        }
    }

    /// Backend that reads fine but cannot be written.
    #[derive(Debug, Clone, Default)]
    struct ReadOnlyBackend(MemoryBackend);

    impl TokenBackend for ReadOnlyBackend {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.read(key)
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only".to_string()))
        }
    }

    #[test]
    fn test_starts_anonymous() {
        let store = CredentialStore::new(MemoryBackend::new());
        assert!(!store.is_authenticated());
        assert_eq!(store.state(), AuthState::Anonymous);
        assert_eq!(store.load(), None);
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_save_then_restart_returns_same_token() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(FileBackend::in_dir(temp_dir.path()));

        store.save("T1").unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.state(), AuthState::Authenticated);
        assert_eq!(store.token().as_deref(), Some("T1"));

        // Simulated restart: a fresh store over the same file
        let restarted = CredentialStore::new(FileBackend::in_dir(temp_dir.path()));
        assert!(!restarted.is_authenticated());
        assert_eq!(restarted.load().as_deref(), Some("T1"));
        assert!(restarted.is_authenticated());
    }

    #[test]
    fn test_clear_then_restart_is_absent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(FileBackend::in_dir(temp_dir.path()));
        store.save("T1").unwrap();

        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.token(), None);

        let restarted = CredentialStore::new(FileBackend::in_dir(temp_dir.path()));
        assert_eq!(restarted.load(), None);
        assert!(!restarted.is_authenticated());
    }

    #[test]
    fn test_clear_when_anonymous_is_ok() {
        let store = CredentialStore::new(MemoryBackend::new());
        store.clear().unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let store = CredentialStore::new(MemoryBackend::new());
        store.save("").unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.token(), None);
    }

    #[test]
    fn test_load_failure_is_absent() {
        let store = CredentialStore::new(BrokenBackend);
        assert_eq!(store.load(), None);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let backend = ReadOnlyBackend::default();
        backend.0.write(TOKEN_KEY, "OLD").unwrap();
        let store = CredentialStore::new(backend);
        assert_eq!(store.load().as_deref(), Some("OLD"));

        let err = store.save("NEW").unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(store.token().as_deref(), Some("OLD"));
    }

    #[test]
    fn test_failed_clear_leaves_memory_unchanged() {
        let backend = ReadOnlyBackend::default();
        backend.0.write(TOKEN_KEY, "OLD").unwrap();
        let store = CredentialStore::new(backend);
        store.load();

        assert!(store.clear().is_err());
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_clones_share_state() {
        let store = CredentialStore::new(MemoryBackend::new());
        let handle = store.clone();

        store.save("T1").unwrap();
        assert_eq!(handle.token().as_deref(), Some("T1"));

        handle.clear().unwrap();
        assert!(!store.is_authenticated());
    }

    /// Persists immediately, then stalls before returning, widening the gap
    /// between the durable write and the in-memory update.
    #[derive(Debug, Clone, Default)]
    struct SlowWriteBackend(MemoryBackend);

    impl TokenBackend for SlowWriteBackend {
        fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.0.write(key, value)?;
            std::thread::sleep(std::time::Duration::from_millis(200));
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_concurrent_save_and_clear_is_last_writer_wins() {
        let backend = SlowWriteBackend::default();
        let store = CredentialStore::new(backend.clone());

        let saver = {
            let store = store.clone();
            std::thread::spawn(move || store.save("T1").unwrap())
        };
        // Start clearing while the save is still inside its durable write
        std::thread::sleep(std::time::Duration::from_millis(50));
        let clearer = {
            let store = store.clone();
            std::thread::spawn(move || store.clear().unwrap())
        };
        saver.join().unwrap();
        clearer.join().unwrap();

        // Memory and durable state agree on a single winner
        assert_eq!(backend.read(TOKEN_KEY).unwrap(), store.token());

        let restarted = CredentialStore::new(backend.clone());
        assert_eq!(restarted.load().is_some(), store.is_authenticated());
    }

    #[test]
    fn test_concurrent_writers_agree_with_backend() {
        let backend = MemoryBackend::new();
        let store = CredentialStore::new(backend.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            store.save(&format!("T{}", i)).unwrap();
                        } else {
                            store.clear().unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backend.read(TOKEN_KEY).unwrap(), store.token());
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let store = CredentialStore::new(MemoryBackend::new());
        store.save("super-secret").unwrap();
        assert!(!format!("{:?}", store).contains("super-secret"));
    }
}
