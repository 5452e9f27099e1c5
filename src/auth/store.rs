//! Credential storage: an in-memory mirror backed by interchangeable
//! durable storage.
//!
//! The store keeps exactly one credential. The in-memory copy is what the
//! rest of the crate reads; the durable backend (file, OS keychain, or
//! in-memory for tests) holds the same value across restarts. Both copies
//! are updated together through `set`/`clear`, so a valid credential is
//! always mirrored and a cleared one is gone from both places.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Credential file name inside the storage directory
const CREDENTIAL_FILE: &str = "credential.json";

/// Keyring service name for the keychain-backed storage
const KEYRING_SERVICE: &str = "authgate";

/// Keyring account name. A single slot - the store holds one credential.
const KEYRING_ACCOUNT: &str = "session";

/// Opaque bearer token proving identity to the backend.
///
/// Construction rejects empty strings, so any `Credential` value in the
/// program is non-empty by type. Debug output elides the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Build a credential from a raw token, rejecting empty input.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({} bytes)", self.0.len())
    }
}

/// Record persisted by every storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    pub principal: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn new(credential: &Credential, principal: Option<&str>) -> Self {
        Self {
            token: credential.as_str().to_string(),
            principal: principal.map(str::to_string),
            saved_at: Utc::now(),
        }
    }

    /// Age of the record in minutes (for logging, not expiry).
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.saved_at).num_minutes().max(0)
    }
}

/// Durable key-value persistence for the single credential record.
///
/// All operations are synchronous; backends must not perform network I/O.
pub trait CredentialStorage: Send + Sync {
    fn load(&self) -> Result<Option<StoredCredential>>;
    fn store(&self, record: &StoredCredential) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// File-backed storage: one JSON file in a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn credential_path(&self) -> PathBuf {
        self.dir.join(CREDENTIAL_FILE)
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<StoredCredential>> {
        let path = self.credential_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read credential file")?;
        let record: StoredCredential = serde_json::from_str(&contents)
            .context("Failed to parse credential file")?;
        Ok(Some(record))
    }

    fn store(&self, record: &StoredCredential) -> Result<()> {
        let path = self.credential_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(path, contents).context("Failed to write credential file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.credential_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credential file")?;
        }
        Ok(())
    }
}

/// OS keychain storage via keyring. The record is stored as a JSON string
/// under a fixed service/account pair.
pub struct KeyringStorage {
    service: String,
    account: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            account: KEYRING_ACCOUNT.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStorage for KeyringStorage {
    fn load(&self) -> Result<Option<StoredCredential>> {
        match self.entry()?.get_password() {
            Ok(contents) => {
                let record: StoredCredential = serde_json::from_str(&contents)
                    .context("Failed to parse keychain credential entry")?;
                Ok(Some(record))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read credential from keychain"),
        }
    }

    fn store(&self, record: &StoredCredential) -> Result<()> {
        let contents = serde_json::to_string(record)?;
        self.entry()?
            .set_password(&contents)
            .context("Failed to store credential in keychain")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    record: std::sync::Mutex<Option<StoredCredential>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoredCredential>> {
        Ok(self.record.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, record: &StoredCredential) -> Result<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// The single source of truth for the current credential.
///
/// Reads are served from memory; writes go to memory and the durable
/// backend together. The store performs no network I/O - it is a
/// dependency of every other component, never the other way around.
pub struct CredentialStore {
    backend: Box<dyn CredentialStorage>,
    credential: Option<Credential>,
    principal: Option<String>,
}

impl CredentialStore {
    /// Create a store, seeding memory from durable storage (the one
    /// process-start read).
    pub fn new(backend: Box<dyn CredentialStorage>) -> Self {
        let mut store = Self {
            backend,
            credential: None,
            principal: None,
        };
        store.reload();
        store
    }

    pub fn get(&self) -> Option<Credential> {
        self.credential.clone()
    }

    pub fn principal(&self) -> Option<String> {
        self.principal.clone()
    }

    /// Store a credential in memory and durable storage.
    ///
    /// The durable write happens first; on failure, memory is left
    /// unchanged so the two copies never diverge.
    pub fn set(&mut self, credential: &Credential, principal: Option<&str>) -> Result<()> {
        let record = StoredCredential::new(credential, principal);
        self.backend.store(&record)?;
        self.credential = Some(credential.clone());
        self.principal = principal.map(str::to_string);
        Ok(())
    }

    /// Remove the credential from memory and durable storage. Idempotent.
    ///
    /// Memory is cleared first: a failing backend must not keep a dead
    /// credential alive in the running process.
    pub fn clear(&mut self) -> Result<()> {
        self.credential = None;
        self.principal = None;
        self.backend.remove()?;
        Ok(())
    }

    /// Re-read durable storage and adopt its contents.
    ///
    /// Backend read failures are logged and leave memory untouched; a
    /// missing or malformed record clears memory.
    pub fn reload(&mut self) -> Option<Credential> {
        match self.backend.load() {
            Ok(Some(record)) => {
                debug!(age_minutes = record.age_minutes(), "loaded stored credential");
                match Credential::new(record.token) {
                    Some(credential) => {
                        self.credential = Some(credential);
                        self.principal = record.principal;
                    }
                    None => {
                        warn!("stored credential is empty; ignoring");
                        self.credential = None;
                        self.principal = None;
                    }
                }
            }
            Ok(None) => {
                self.credential = None;
                self.principal = None;
            }
            Err(e) => {
                warn!(error = %e, "could not read credential storage");
            }
        }
        self.credential.clone()
    }
}
