//! Session expiry hook: the cross-cutting invalidation path.
//!
//! Installed once per active route guard, the hook watches the status of
//! every response leaving the shared client. A 401 or 403 from any screen
//! ends the session and sends the user to login - exactly once, no matter
//! how many failing responses race in, because `Session::logout` reports
//! whether this caller performed the transition.

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::client::ResponseHook;
use crate::auth::Session;
use crate::guard::Navigator;

pub struct SessionExpiryHook {
    session: Session,
    navigator: Arc<dyn Navigator>,
}

impl SessionExpiryHook {
    pub fn new(session: Session, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }
}

impl ResponseHook for SessionExpiryHook {
    fn on_status(&self, status: StatusCode) {
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return;
        }
        if self.session.logout() {
            warn!(%status, "authorization failure observed; session invalidated");
            self.navigator.redirect_to_login();
        } else {
            // Someone else already ended the session; their redirect stands.
            debug!(%status, "authorization failure on an already-anonymous session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialStore, MemoryStorage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingNavigator {
        redirects: AtomicUsize,
    }

    impl RecordingNavigator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                redirects: AtomicUsize::new(0),
            })
        }
        fn count(&self) -> usize {
            self.redirects.load(Ordering::SeqCst)
        }
    }

    impl Navigator for RecordingNavigator {
        fn redirect_to_login(&self) {
            self.redirects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn authenticated_session() -> Session {
        let session = Session::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        session
            .login(Credential::new("tok1").unwrap(), None)
            .unwrap();
        session
    }

    #[test]
    fn test_401_ends_the_session_and_redirects_once() {
        let session = authenticated_session();
        let navigator = RecordingNavigator::new();
        let hook = SessionExpiryHook::new(session.clone(), navigator.clone());

        hook.on_status(StatusCode::UNAUTHORIZED);
        assert!(!session.is_authenticated());
        assert_eq!(navigator.count(), 1);

        // A second failing response must not redirect again.
        hook.on_status(StatusCode::UNAUTHORIZED);
        assert_eq!(navigator.count(), 1);
    }

    #[test]
    fn test_403_is_treated_like_401() {
        let session = authenticated_session();
        let navigator = RecordingNavigator::new();
        let hook = SessionExpiryHook::new(session.clone(), navigator.clone());

        hook.on_status(StatusCode::FORBIDDEN);
        assert!(!session.is_authenticated());
        assert_eq!(navigator.count(), 1);
    }

    #[test]
    fn test_non_auth_statuses_are_ignored() {
        let session = authenticated_session();
        let navigator = RecordingNavigator::new();
        let hook = SessionExpiryHook::new(session.clone(), navigator.clone());

        for status in [
            StatusCode::OK,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            hook.on_status(status);
        }
        assert!(session.is_authenticated());
        assert_eq!(navigator.count(), 0);
    }
}
