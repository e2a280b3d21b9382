//! Account lookup and delegated credential collaborators.
//!
//! The session core never owns account data. It consumes an
//! [`AccountService`] for lookups (including the `active` flag consulted on
//! every session read), an optional [`CredentialBackend`] for delegated
//! password verification (directory-backed deployments), per-provider
//! [`OAuthTokenVerifier`]s, and a [`CapabilityChecker`] that gates the one
//! privileged operation in this core: impersonation.
//!
//! In-memory implementations are provided for tests and small installs.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

// =============================================================================
// Account identity
// =============================================================================

/// Numeric account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(u64);

impl AccountId {
    pub fn new(id: u64) -> Self {
        AccountId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account data as seen by the authentication core.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// Numeric id.
    pub id: AccountId,
    /// Login username, if the account has one.
    pub username: Option<String>,
    /// Preferred email, used by flexible resolution.
    pub email: Option<String>,
    /// Inactive accounts can never be signed in, even with a valid record.
    pub active: bool,
    /// Encoded HTTP password, if one is stored locally.
    pub password_hash: Option<String>,
}

impl AccountInfo {
    pub fn new(id: AccountId) -> Self {
        AccountInfo {
            id,
            username: None,
            email: None,
            active: true,
            password_hash: None,
        }
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn password_hash(mut self, hash: String) -> Self {
        self.password_hash = Some(hash);
        self
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Account lookup errors.
#[derive(Debug)]
pub enum AccountError {
    /// A flexible identifier matched more than one account.
    Ambiguous,
    /// The backing account index could not be consulted.
    Unavailable(String),
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::Ambiguous => write!(f, "identifier matches multiple accounts"),
            AccountError::Unavailable(e) => write!(f, "account index unavailable: {}", e),
        }
    }
}

impl std::error::Error for AccountError {}

/// Errors from delegated credential verification.
#[derive(Debug)]
pub enum BackendError {
    /// The backend has no record of this user; callers may fall back to
    /// another verification policy.
    NoSuchUser,
    /// The backend knows the user but rejected the credential.
    BadCredentials,
    /// The backend could not be reached or timed out. Always treated as a
    /// verification failure by callers, never as success.
    Unavailable(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NoSuchUser => write!(f, "no such user"),
            BackendError::BadCredentials => write!(f, "bad credentials"),
            BackendError::Unavailable(e) => write!(f, "credential backend unavailable: {}", e),
        }
    }
}

impl std::error::Error for BackendError {}

// =============================================================================
// Collaborator traits
// =============================================================================

/// Lookup service for accounts.
pub trait AccountService: Send + Sync {
    fn by_id(&self, id: AccountId) -> Result<Option<AccountInfo>, AccountError>;

    fn by_username(&self, username: &str) -> Result<Option<AccountInfo>, AccountError>;

    /// Resolves a flexible identifier. The default tries username first,
    /// then a numeric id; implementations backed by an email index should
    /// override it to also match emails between those two steps, returning
    /// `Err(Ambiguous)` when an email matches more than one account (see
    /// [`MemoryAccountService`]).
    fn resolve(&self, identifier: &str) -> Result<Option<AccountInfo>, AccountError> {
        if let Some(account) = self.by_username(identifier)? {
            return Ok(Some(account));
        }
        if let Ok(id) = identifier.parse::<u64>() {
            return self.by_id(AccountId::new(id));
        }
        Ok(None)
    }
}

/// Delegated username/password verification (e.g. a directory server).
pub trait CredentialBackend: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Result<AccountId, BackendError>;
}

/// Pluggable bearer-token verification for one OAuth provider.
pub trait OAuthTokenVerifier: Send + Sync {
    fn verify(&self, username: &str, token: &str) -> Result<AccountId, BackendError>;
}

/// Capability checks. The core consults a single global capability, used to
/// gate impersonation.
pub trait CapabilityChecker: Send + Sync {
    fn can_run_as(&self, account: AccountId) -> bool;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// In-memory account store.
///
/// # Example
/// ```ignore
/// let accounts = MemoryAccountService::new()
///     .with_account(AccountInfo::new(AccountId::new(1)).username("admin"));
/// ```
#[derive(Default)]
pub struct MemoryAccountService {
    accounts: RwLock<HashMap<u64, AccountInfo>>,
}

impl MemoryAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account: AccountInfo) -> Self {
        self.insert(account);
        self
    }

    pub fn insert(&self, account: AccountInfo) {
        if let Ok(mut accounts) = self.accounts.write() {
            if accounts.insert(account.id.get(), account).is_some() {
                eprintln!("Warning: replacing existing account entry");
            }
        }
    }

    /// Flips the active flag on an existing account.
    pub fn set_active(&self, id: AccountId, active: bool) {
        if let Ok(mut accounts) = self.accounts.write() {
            if let Some(account) = accounts.get_mut(&id.get()) {
                account.active = active;
            }
        }
    }
}

impl AccountService for MemoryAccountService {
    // resolve() is overridden below to add the email step.
    fn by_id(&self, id: AccountId) -> Result<Option<AccountInfo>, AccountError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| AccountError::Unavailable("lock poisoned".into()))?;
        Ok(accounts.get(&id.get()).cloned())
    }

    fn by_username(&self, username: &str) -> Result<Option<AccountInfo>, AccountError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| AccountError::Unavailable("lock poisoned".into()))?;
        Ok(accounts
            .values()
            .find(|a| a.username.as_deref() == Some(username))
            .cloned())
    }

    fn resolve(&self, identifier: &str) -> Result<Option<AccountInfo>, AccountError> {
        if let Some(account) = self.by_username(identifier)? {
            return Ok(Some(account));
        }

        let accounts = self
            .accounts
            .read()
            .map_err(|_| AccountError::Unavailable("lock poisoned".into()))?;
        let by_email: Vec<&AccountInfo> = accounts
            .values()
            .filter(|a| a.email.as_deref() == Some(identifier))
            .collect();
        match by_email.len() {
            1 => return Ok(Some(by_email[0].clone())),
            0 => {}
            _ => return Err(AccountError::Ambiguous),
        }
        drop(accounts);

        if let Ok(id) = identifier.parse::<u64>() {
            return self.by_id(AccountId::new(id));
        }
        Ok(None)
    }
}

/// Capability checker backed by an explicit allow list.
#[derive(Default)]
pub struct MemoryCapabilityChecker {
    run_as: Vec<AccountId>,
}

impl MemoryCapabilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_run_as(mut self, account: AccountId) -> Self {
        if !self.run_as.contains(&account) {
            self.run_as.push(account);
        }
        self
    }
}

impl CapabilityChecker for MemoryCapabilityChecker {
    fn can_run_as(&self, account: AccountId) -> bool {
        self.run_as.contains(&account)
    }
}

/// Credential backend backed by a plain username/password map, for tests.
#[derive(Default)]
pub struct MemoryCredentialBackend {
    users: HashMap<String, (String, AccountId)>,
    unavailable: bool,
}

impl MemoryCredentialBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, password: &str, id: AccountId) -> Self {
        self.users
            .insert(username.to_string(), (password.to_string(), id));
        self
    }

    /// Makes every call fail with `Unavailable`, simulating an outage.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

impl CredentialBackend for MemoryCredentialBackend {
    fn verify(&self, username: &str, password: &str) -> Result<AccountId, BackendError> {
        if self.unavailable {
            return Err(BackendError::Unavailable("backend offline".into()));
        }
        match self.users.get(username) {
            Some((stored, id)) if stored == password => Ok(*id),
            Some(_) => Err(BackendError::BadCredentials),
            None => Err(BackendError::NoSuchUser),
        }
    }
}
