//! Session persistence and in-memory caching.
//!
//! The facade only needs a `get`/`set`/`clear` seam; the backends here cover
//! the expected deployments: a durable file store, a process-local slot and
//! a no-op for callers that want every poll to hit the network.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::session::SessionState;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// A persistence backend for session data.
///
/// Implementations must swallow their own storage failures: `get` answers
/// absence, `set` answers success, and neither may propagate errors into the
/// polling path.
pub trait Persistence: Send + Sync {
    /// Returns the stored session, or `None` if absent or expired.
    fn get(&self) -> Option<SessionState>;

    /// Store a session with a relative TTL. Returns whether the store
    /// succeeded.
    fn set(&self, value: &SessionState, expires_in: Duration) -> bool;

    /// Remove the stored session.
    fn clear(&self);
}

fn expires_on(expires_in: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::zero())
}

fn is_expired(expires_at: DateTime<Utc>) -> bool {
    expires_at <= Utc::now()
}

/// A persistence backend that ignores everything passed to it.
#[derive(Debug, Default)]
pub struct NullPersistence;

impl Persistence for NullPersistence {
    fn get(&self) -> Option<SessionState> {
        None
    }

    fn set(&self, _value: &SessionState, _expires_in: Duration) -> bool {
        false
    }

    fn clear(&self) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    session: SessionState,
    expires_at: DateTime<Utc>,
}

/// A process-local, single-slot persistence backend.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<StoredSession>>,
}

impl MemoryPersistence {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryPersistence {
    fn get(&self) -> Option<SessionState> {
        let mut slot = self.slot.lock().expect("persistence lock poisoned");
        match &*slot {
            Some(stored) if !is_expired(stored.expires_at) => Some(stored.session.clone()),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    fn set(&self, value: &SessionState, expires_in: Duration) -> bool {
        let mut slot = self.slot.lock().expect("persistence lock poisoned");
        *slot = Some(StoredSession {
            session: value.clone(),
            expires_at: expires_on(expires_in),
        });
        true
    }

    fn clear(&self) {
        let mut slot = self.slot.lock().expect("persistence lock poisoned");
        *slot = None;
    }
}

/// A durable persistence backend that keeps the session in a JSON file.
///
/// Storage failures are logged and reported as absence/failure rather than
/// propagated.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    /// Create a file-backed persistence at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Persistence for FilePersistence {
    fn get(&self) -> Option<SessionState> {
        if !self.path.exists() {
            return None;
        }
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to read session file");
                return None;
            }
        };
        let stored: StoredSession = match serde_json::from_str(&json) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "invalid session file");
                self.clear();
                return None;
            }
        };
        if is_expired(stored.expires_at) {
            self.clear();
            return None;
        }
        Some(stored.session)
    }

    fn set(&self, value: &SessionState, expires_in: Duration) -> bool {
        let stored = StoredSession {
            session: value.clone(),
            expires_at: expires_on(expires_in),
        };
        let json = match serde_json::to_string_pretty(&stored) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize session");
                return false;
            }
        };
        if let Err(e) = fs::write(&self.path, &json) {
            warn!(error = %e, "failed to write session file");
            return false;
        }

        // Session files hold tokens; keep them private (Unix only)
        #[cfg(unix)]
        {
            if let Ok(metadata) = fs::metadata(&self.path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                let _ = fs::set_permissions(&self.path, perms);
            }
        }

        true
    }

    fn clear(&self) {
        if self.path.exists()
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(error = %e, "failed to remove session file");
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// A keyed in-memory cache with per-entry TTLs, used for entitlement
/// responses.
#[derive(Debug)]
pub struct MemoryCache {
    default_expires_in: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Create a cache with a default TTL for entries stored without one.
    pub fn new(default_expires_in: Duration) -> Self {
        Self {
            default_expires_in,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for a key, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if !is_expired(entry.expires_at) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value under a key, with an optional TTL override.
    pub fn set(&self, key: impl Into<String>, value: Value, expires_in: Option<Duration>) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: expires_on(expires_in.unwrap_or(self.default_expires_in)),
            },
        );
    }

    /// Remove one key.
    pub fn clear(&self, key: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(key);
    }

    /// Remove every key.
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_session() -> SessionState {
        SessionState {
            user_id: Some("u1".to_string()),
            expires_in: Some(3600),
            ..SessionState::default()
        }
    }

    #[test]
    fn null_persistence_ignores_everything() {
        let persist = NullPersistence;
        assert!(!persist.set(&sample_session(), Duration::from_secs(60)));
        assert!(persist.get().is_none());
        persist.clear();
    }

    #[test]
    fn memory_persistence_round_trip() {
        let persist = MemoryPersistence::new();
        assert!(persist.set(&sample_session(), Duration::from_secs(60)));
        assert_eq!(persist.get(), Some(sample_session()));
        persist.clear();
        assert!(persist.get().is_none());
    }

    #[test]
    fn memory_persistence_expires() {
        let persist = MemoryPersistence::new();
        assert!(persist.set(&sample_session(), Duration::ZERO));
        assert!(persist.get().is_none());
    }

    #[test]
    fn file_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let persist = FilePersistence::new(dir.path().join("session.json"));

        assert!(persist.get().is_none());
        assert!(persist.set(&sample_session(), Duration::from_secs(60)));
        assert_eq!(persist.get(), Some(sample_session()));

        persist.clear();
        assert!(persist.get().is_none());
        assert!(!persist.path().exists());
    }

    #[test]
    fn file_persistence_expires() {
        let dir = tempfile::tempdir().unwrap();
        let persist = FilePersistence::new(dir.path().join("session.json"));

        assert!(persist.set(&sample_session(), Duration::ZERO));
        assert!(persist.get().is_none());
        // Expired entry is cleaned up on read
        assert!(!persist.path().exists());
    }

    #[test]
    fn file_persistence_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let persist = FilePersistence::new(&path);
        assert!(persist.get().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_persistence_sets_restrictive_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let persist = FilePersistence::new(dir.path().join("session.json"));
        assert!(persist.set(&sample_session(), Duration::from_secs(60)));

        let mode = fs::metadata(persist.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_cache_keyed_entries() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("prd_1", json!({"result": true}), None);

        assert_eq!(cache.get("prd_1"), Some(json!({"result": true})));
        assert!(cache.get("prd_2").is_none());

        cache.clear("prd_1");
        assert!(cache.get("prd_1").is_none());
    }

    #[test]
    fn memory_cache_ttl_override() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("prd_1", json!({"result": true}), Some(Duration::ZERO));
        assert!(cache.get("prd_1").is_none());
    }

    #[test]
    fn memory_cache_clear_all() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.set("prd_1", json!(1), None);
        cache.set("sub_1", json!(2), None);
        cache.clear_all();
        assert!(cache.get("prd_1").is_none());
        assert!(cache.get("sub_1").is_none());
    }
}
