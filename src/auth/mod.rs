//! Authentication module for session state and credential storage.
//!
//! This module provides:
//! - `CredentialStore`: single source of truth for the bearer credential,
//!   mirrored between memory and a durable backend
//! - `Session`: shared handle over the two-state session machine, with
//!   `login`/`logout` as the only mutators
//!
//! Credentials persist across restarts via a file, the OS keychain, or
//! an in-memory backend for tests.

pub mod session;
pub mod store;

pub use session::{Session, SessionState};
pub use store::{
    Credential, CredentialStorage, CredentialStore, FileStorage, KeyringStorage, MemoryStorage,
    StoredCredential,
};
