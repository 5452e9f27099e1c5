//! Session state machine and the shared session handle.
//!
//! Two states exist: anonymous and authenticated. The only mutators are
//! the `login` and `logout` transitions, applied atomically under one
//! lock together with the credential store update. The `authenticated`
//! flag is set and cleared only alongside the credential, so
//! `authenticated == true` holds exactly when a credential is present.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tracing::{debug, info, warn};

use super::store::{Credential, CredentialStore};

/// Pure session state: credential, principal, and the derived flag.
#[derive(Debug, Clone)]
pub struct SessionState {
    credential: Option<Credential>,
    principal: Option<String>,
    authenticated: bool,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self {
            credential: None,
            principal: None,
            authenticated: false,
        }
    }

    /// `Login` transition. Valid from both states; re-login overwrites.
    pub fn login(&mut self, credential: Credential, principal: Option<String>) {
        self.credential = Some(credential);
        self.principal = principal;
        self.authenticated = true;
    }

    /// `Logout` transition. Idempotent; returns whether a transition
    /// actually occurred.
    pub fn logout(&mut self) -> bool {
        if !self.authenticated {
            return false;
        }
        self.credential = None;
        self.principal = None;
        self.authenticated = false;
        true
    }

    /// Record the validated principal on an authenticated session.
    /// Metadata only - not a transition, the credential and flag are
    /// untouched. No-op when anonymous.
    pub fn confirm_principal(&mut self, principal: &str) {
        if self.authenticated {
            self.principal = Some(principal.to_string());
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }
}

struct Inner {
    state: SessionState,
    store: CredentialStore,
    /// Bumped on every credential change; backs the stale-response guard.
    epoch: u64,
}

/// Shared handle to the one session. Clone is cheap (Arc internally).
///
/// Every component reads and writes session state through this handle;
/// no caller can set the flag without a credential or drop the credential
/// without clearing the flag, because only `login`/`logout` mutate.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    /// Create the session, seeding state from the store's process-start
    /// read of durable storage.
    pub fn new(store: CredentialStore) -> Self {
        let mut state = SessionState::anonymous();
        if let Some(credential) = store.get() {
            state.login(credential, store.principal());
        }
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                store,
                epoch: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Login` transition: persist the credential, then switch state.
    ///
    /// The durable write happens before the in-memory transition; a
    /// failing backend leaves the session unchanged.
    pub fn login(&self, credential: Credential, principal: Option<String>) -> Result<()> {
        let mut inner = self.lock();
        inner.store.set(&credential, principal.as_deref())?;
        inner.state.login(credential, principal);
        inner.epoch += 1;
        info!("session established");
        Ok(())
    }

    /// `Logout` transition. Idempotent; returns whether this call
    /// performed the transition.
    ///
    /// Concurrent invalidation triggers (the guard's own validation
    /// failing while the interceptor observes a 401 elsewhere) collapse
    /// here: only the first caller gets `true` and owns the redirect.
    pub fn logout(&self) -> bool {
        Self::end_session(&mut self.lock())
    }

    /// `Logout` transition, applied only if the credential epoch still
    /// equals `expected`.
    ///
    /// The epoch compare and the transition happen under one lock, so a
    /// rejection computed against an old credential can never end a
    /// session that was re-established while the result was in flight -
    /// there is no window between "still epoch N?" and the logout.
    pub fn logout_if_epoch(&self, expected: u64) -> bool {
        let mut inner = self.lock();
        if inner.epoch != expected {
            return false;
        }
        Self::end_session(&mut inner)
    }

    fn end_session(inner: &mut Inner) -> bool {
        if !inner.state.is_authenticated() {
            return false;
        }
        if let Err(e) = inner.store.clear() {
            // The store drops its in-memory copy regardless; only the
            // durable removal failed, and the session still ends.
            warn!(error = %e, "could not remove credential from durable storage");
        }
        inner.state.logout();
        inner.epoch += 1;
        info!("session cleared");
        true
    }

    /// Record the principal reported by a successful validation.
    pub fn confirm_principal(&self, principal: &str) {
        self.lock().state.confirm_principal(principal);
    }

    /// Record the principal only if the credential epoch still equals
    /// `expected`; a principal resolved for a superseded credential is
    /// dropped. Same single-lock rule as [`Session::logout_if_epoch`].
    pub fn confirm_principal_if_epoch(&self, principal: &str, expected: u64) -> bool {
        let mut inner = self.lock();
        if inner.epoch != expected {
            return false;
        }
        inner.state.confirm_principal(principal);
        true
    }

    /// Re-read durable storage and adopt its contents via the normal
    /// transitions. Called by the guard on every activation.
    pub fn sync_from_storage(&self) {
        let mut inner = self.lock();
        let before = inner.state.credential().cloned();
        let loaded = inner.store.reload();
        match (loaded, before) {
            (Some(new), Some(old)) if new == old => {}
            (Some(new), _) => {
                debug!("adopting credential found in durable storage");
                let principal = inner.store.principal();
                inner.state.login(new, principal);
                inner.epoch += 1;
            }
            (None, Some(_)) => {
                debug!("credential gone from durable storage; logging out");
                inner.state.logout();
                inner.epoch += 1;
            }
            (None, None) => {}
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        self.lock().state.credential().cloned()
    }

    pub fn principal(&self) -> Option<String> {
        self.lock().state.principal().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().state.is_authenticated()
    }

    /// Current credential epoch. A validation result computed under an
    /// older epoch is stale and must be discarded.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{CredentialStorage, MemoryStorage, StoredCredential};

    fn session() -> Session {
        Session::new(CredentialStore::new(Box::new(MemoryStorage::new())))
    }

    fn credential(token: &str) -> Credential {
        Credential::new(token).unwrap()
    }

    /// Storage backend sharing its record with the test body.
    struct SharedBackend(Arc<MemoryStorage>);

    impl CredentialStorage for SharedBackend {
        fn load(&self) -> anyhow::Result<Option<StoredCredential>> {
            self.0.load()
        }
        fn store(&self, record: &StoredCredential) -> anyhow::Result<()> {
            self.0.store(record)
        }
        fn remove(&self) -> anyhow::Result<()> {
            self.0.remove()
        }
    }

    #[test]
    fn test_authenticated_iff_credential_present() {
        let session = session();
        assert!(!session.is_authenticated());
        assert!(session.credential().is_none());

        session.login(credential("tok1"), None).unwrap();
        assert!(session.is_authenticated());
        assert!(session.credential().is_some());

        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.credential().is_none());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let session = session();
        session.login(credential("tok1"), None).unwrap();

        assert!(session.logout());
        assert!(!session.logout());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_logout_when_never_logged_in_is_not_an_error() {
        assert!(!session().logout());
    }

    #[test]
    fn test_relogin_overwrites() {
        let session = session();
        session
            .login(credential("tok1"), Some("alice".into()))
            .unwrap();
        session
            .login(credential("tok2"), Some("bob".into()))
            .unwrap();

        assert_eq!(session.credential(), Some(credential("tok2")));
        assert_eq!(session.principal().as_deref(), Some("bob"));
    }

    #[test]
    fn test_epoch_bumps_on_every_transition() {
        let session = session();
        let e0 = session.epoch();

        session.login(credential("tok1"), None).unwrap();
        let e1 = session.epoch();
        assert!(e1 > e0);

        session.logout();
        assert!(session.epoch() > e1);

        // Idempotent logout does not move the epoch.
        let settled = session.epoch();
        session.logout();
        assert_eq!(session.epoch(), settled);
    }

    #[test]
    fn test_logout_if_epoch_refuses_a_superseded_epoch() {
        let session = session();
        session.login(credential("tok1"), None).unwrap();
        let epoch = session.epoch();

        // A fresh login lands before the old credential's rejection does.
        session.login(credential("tok2"), None).unwrap();

        assert!(!session.logout_if_epoch(epoch));
        assert!(session.is_authenticated());
        assert_eq!(session.credential(), Some(credential("tok2")));

        // With the current epoch the transition goes through.
        assert!(session.logout_if_epoch(session.epoch()));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_confirm_principal_if_epoch_drops_superseded_result() {
        let session = session();
        session.login(credential("tok1"), None).unwrap();
        let epoch = session.epoch();

        session
            .login(credential("tok2"), Some("bob".into()))
            .unwrap();

        assert!(!session.confirm_principal_if_epoch("alice", epoch));
        assert_eq!(session.principal().as_deref(), Some("bob"));

        assert!(session.confirm_principal_if_epoch("alice", session.epoch()));
        assert_eq!(session.principal().as_deref(), Some("alice"));
    }

    #[test]
    fn test_confirm_principal_requires_authentication() {
        let session = session();
        session.confirm_principal("alice");
        assert!(session.principal().is_none());

        session.login(credential("tok1"), None).unwrap();
        session.confirm_principal("alice");
        assert_eq!(session.principal().as_deref(), Some("alice"));
    }

    #[test]
    fn test_new_seeds_from_durable_storage() {
        let backend = MemoryStorage::new();
        backend
            .store(&StoredCredential::new(&credential("persisted"), Some("alice")))
            .unwrap();

        let session = Session::new(CredentialStore::new(Box::new(backend)));
        assert!(session.is_authenticated());
        assert_eq!(session.credential(), Some(credential("persisted")));
        assert_eq!(session.principal().as_deref(), Some("alice"));
    }

    #[test]
    fn test_sync_from_storage_adopts_external_logout() {
        let backend = Arc::new(MemoryStorage::new());
        let session = Session::new(CredentialStore::new(Box::new(SharedBackend(
            Arc::clone(&backend),
        ))));
        session.login(credential("tok1"), None).unwrap();
        let epoch = session.epoch();

        // Another process wipes the stored credential.
        backend.remove().unwrap();
        session.sync_from_storage();

        assert!(!session.is_authenticated());
        assert!(session.epoch() > epoch);

        // A second sync with nothing stored changes nothing.
        let settled = session.epoch();
        session.sync_from_storage();
        assert_eq!(session.epoch(), settled);
    }

    #[test]
    fn test_sync_from_storage_adopts_external_login() {
        let backend = Arc::new(MemoryStorage::new());
        let session = Session::new(CredentialStore::new(Box::new(SharedBackend(
            Arc::clone(&backend),
        ))));
        assert!(!session.is_authenticated());

        // Another process (the login screen) stores a credential.
        backend
            .store(&StoredCredential::new(&credential("tok1"), Some("alice")))
            .unwrap();
        session.sync_from_storage();

        assert!(session.is_authenticated());
        assert_eq!(session.credential(), Some(credential("tok1")));
    }
}
