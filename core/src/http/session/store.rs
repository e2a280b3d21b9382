//! Session record storage.
//!
//! The store maps opaque session keys to immutable [`SessionRecord`]s. A
//! refresh is a full replace-by-key, never an in-place mutation, so
//! concurrent refreshes of the same record are a benign race: both writers
//! store equivalent records (same `session_id`/`auth_secret`, a new but
//! still-valid expiry).
//!
//! The backing cache is pluggable through [`SessionCache`]; the bundled
//! [`MemorySessionCache`] is a bounded in-process map suitable for a single
//! instance. A multi-instance deployment may substitute an external cache
//! as long as get/put/invalidate semantics are preserved.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::http::auth::accounts::AccountId;
use crate::http::session::token::{SessionKey, TokenCodec};

/// Hard lower bound under which a configured max age is suspicious.
const SANE_MIN_AGE: Duration = Duration::from_secs(5 * 60);

/// Cookies are refreshed at most this long after issue, even for very long
/// session ages.
const MAX_REFRESH_WAIT: Duration = Duration::from_secs(60 * 60);

// =============================================================================
// Session record
// =============================================================================

/// Value stored under a session key.
///
/// `session_id` and `auth_secret`, once set for a login, never change for
/// the life of that login; only the two timestamps move forward on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The bound identity.
    pub account_id: AccountId,
    /// Hard expiry; past this instant the record is void even if cached.
    pub expires_at: SystemTime,
    /// When reached, the record is reissued with a fresh expiry on next use.
    pub refresh_cookie_at: SystemTime,
    /// Whether the browser should retain the cookie past the browser
    /// session.
    pub persistent_cookie: bool,
    /// Identity of the last external credential used to establish this
    /// session, kept for audit display.
    pub external_id: Option<String>,
    /// Stable per-login identifier for audit correlation, distinct from the
    /// token.
    pub session_id: Option<String>,
    /// Second random secret, independent of the session key, used only for
    /// CSRF validation.
    pub auth_secret: Option<String>,
}

// =============================================================================
// Cache abstraction
// =============================================================================

/// Key-value backing store for session records.
pub trait SessionCache: Send + Sync {
    fn get(&self, key: &SessionKey) -> Option<SessionRecord>;

    fn put(&self, key: SessionKey, record: SessionRecord);

    fn invalidate(&self, key: &SessionKey);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-process cache.
///
/// Entries are capped by `expires_at` anyway; the count bound exists so
/// memory stays bounded even under a flood of logins. When full, expired
/// entries are purged first, then the entry closest to expiry is dropped.
pub struct MemorySessionCache {
    entries: RwLock<HashMap<SessionKey, SessionRecord>>,
    max_entries: usize,
}

impl MemorySessionCache {
    pub fn new(max_entries: usize) -> Self {
        MemorySessionCache {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, key: &SessionKey) -> Option<SessionRecord> {
        let entries = self.entries.read().ok()?;
        entries.get(key).cloned()
    }

    fn put(&self, key: SessionKey, record: SessionRecord) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let now = SystemTime::now();
            entries.retain(|_, r| r.expires_at > now);

            if entries.len() >= self.max_entries {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, r)| r.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                }
            }
        }
        entries.insert(key, record);
    }

    fn invalidate(&self, key: &SessionKey) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

// =============================================================================
// Store configuration
// =============================================================================

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Hard session age; bounds both record expiry and the persisted cookie
    /// age.
    max_age: Duration,
    /// Count bound on the in-memory cache.
    max_entries: usize,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStoreConfig {
    pub fn new() -> Self {
        SessionStoreConfig {
            max_age: Duration::from_secs(12 * 60 * 60),
            max_entries: 16_384,
        }
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn get_max_age(&self) -> Duration {
        self.max_age
    }
}

// =============================================================================
// Session store
// =============================================================================

/// Maps session keys to records, with time-based expiry.
pub struct SessionStore {
    codec: TokenCodec,
    cache: Box<dyn SessionCache>,
    max_age: Duration,
}

impl SessionStore {
    /// Builds a store over the bundled bounded in-memory cache.
    pub fn in_memory(config: SessionStoreConfig) -> Self {
        let cache = Box::new(MemorySessionCache::new(config.max_entries));
        Self::with_cache(config, cache)
    }

    /// Builds a store over a caller-supplied cache (e.g. an external one
    /// shared by several instances).
    pub fn with_cache(config: SessionStoreConfig, cache: Box<dyn SessionCache>) -> Self {
        if config.max_age < SANE_MIN_AGE {
            eprintln!(
                "Warning: session max age {}s is below the sane minimum of {}s",
                config.max_age.as_secs(),
                SANE_MIN_AGE.as_secs()
            );
        }
        SessionStore {
            codec: TokenCodec::new(),
            cache,
            max_age: config.max_age,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Generates a fresh key for an account.
    pub fn create_key(&self, account: AccountId) -> SessionKey {
        self.codec.new_token(account)
    }

    /// Creates and stores a record under `key`.
    ///
    /// Supplied `session_id`/`auth_secret` values are reused so that CSRF
    /// secrets stay stable across a refresh; absent values are generated.
    pub fn create_record(
        &self,
        key: &SessionKey,
        account: AccountId,
        remember: bool,
        external_id: Option<String>,
        session_id: Option<String>,
        auth_secret: Option<String>,
    ) -> SessionRecord {
        let now = SystemTime::now();
        let refresh_wait = (self.max_age / 2).min(MAX_REFRESH_WAIT);

        let record = SessionRecord {
            account_id: account,
            expires_at: now + self.max_age,
            refresh_cookie_at: now + refresh_wait,
            persistent_cookie: remember,
            external_id,
            session_id: Some(session_id.unwrap_or_else(|| self.codec.new_secret())),
            auth_secret: Some(auth_secret.unwrap_or_else(|| self.codec.new_secret())),
        };
        self.cache.put(key.clone(), record.clone());
        record
    }

    /// Looks up a record, lazily evicting it if its hard expiry has passed.
    /// Refresh is the caller's responsibility.
    pub fn get(&self, key: &SessionKey) -> Option<SessionRecord> {
        let record = self.cache.get(key)?;
        if record.expires_at <= SystemTime::now() {
            self.cache.invalidate(key);
            return None;
        }
        Some(record)
    }

    /// Unconditional removal.
    pub fn destroy(&self, key: &SessionKey) {
        self.cache.invalidate(key);
    }

    /// Max-Age for the session cookie: the configured max age in seconds
    /// for persistent cookies, `-1` (browser-session cookie) otherwise.
    pub fn cookie_age_secs(&self, record: &SessionRecord) -> i64 {
        if record.persistent_cookie {
            self.max_age.as_secs() as i64
        } else {
            -1
        }
    }

    /// Number of live entries in the backing cache, for hygiene checks.
    pub fn cached_sessions(&self) -> usize {
        self.cache.len()
    }
}
