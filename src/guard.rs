//! Route guard: the gate in front of every protected view.
//!
//! On each activation the guard synchronizes the session with durable
//! storage, attaches the session expiry hook to the shared client, and
//! validates the credential against the backend before letting protected
//! content render. Consumers re-run `activate` whenever the credential or
//! the authenticated flag changes and read `gate` for the current render
//! state.
//!
//! Validation races are settled by two counters: the session epoch
//! (credential changes) and the guard generation (deactivation). A result
//! that arrives after either has moved is stale and is dropped without
//! touching the session or the navigator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::api::{HttpClient, InterceptorRegistration, SessionExpiryHook, Validate, ValidationOutcome};
use crate::auth::Session;

/// Redirect target for denied navigation.
///
/// Implementations must replace the current history entry rather than
/// push a new one, so the back button cannot return into a denied page.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

/// Render state of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Validation in flight; show an indeterminate progress indicator.
    Pending,
    /// Credential validated; protected content may render.
    Allowed,
    /// No valid credential; the user is sent to login.
    Denied,
}

pub struct RouteGuard<V> {
    session: Session,
    validator: V,
    navigator: Arc<dyn Navigator>,
    client: HttpClient,
    registration: Mutex<Option<InterceptorRegistration>>,
    /// Bumped on deactivation; in-flight validations check it on return.
    generation: AtomicU64,
    gate: Mutex<Gate>,
}

impl<V: Validate> RouteGuard<V> {
    pub fn new(
        session: Session,
        validator: V,
        navigator: Arc<dyn Navigator>,
        client: HttpClient,
    ) -> Self {
        Self {
            session,
            validator,
            navigator,
            client,
            registration: Mutex::new(None),
            generation: AtomicU64::new(0),
            gate: Mutex::new(Gate::Denied),
        }
    }

    /// Run the gate algorithm once.
    ///
    /// No credential denies immediately with zero network calls. With a
    /// credential the gate goes `Pending`, the expiry hook is attached
    /// (once), and the outcome of a single validation call decides
    /// `Allowed` or `Denied`.
    pub async fn activate(&self) -> Gate {
        self.session.sync_from_storage();

        let Some(credential) = self.session.credential() else {
            debug!("no credential present; denying without a network call");
            self.set_gate(Gate::Denied);
            self.navigator.redirect_to_login();
            return Gate::Denied;
        };

        self.ensure_interceptor();

        let generation = self.generation.load(Ordering::SeqCst);
        let epoch = self.session.epoch();
        self.set_gate(Gate::Pending);

        let outcome = self.validator.validate(&credential).await;
        self.settle(outcome, generation, epoch)
    }

    /// Tear the guard down: cancel any in-flight validation result and
    /// release the interceptor registration.
    pub fn deactivate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.lock_registration().take().is_some() {
            debug!("route guard deactivated; interceptor released");
        }
        self.set_gate(Gate::Denied);
    }

    /// Current render state, observable while a validation is in flight.
    pub fn gate(&self) -> Gate {
        *self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_gate(&self, gate: Gate) {
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = gate;
    }

    fn lock_registration(&self) -> std::sync::MutexGuard<'_, Option<InterceptorRegistration>> {
        self.registration.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach the session expiry hook if this guard does not hold a
    /// registration yet. A hook left behind by another owner of the
    /// shared client refuses the installation; the guard still validates,
    /// it just does not observe application traffic.
    fn ensure_interceptor(&self) {
        let mut registration = self.lock_registration();
        if registration.is_some() {
            return;
        }
        let hook = SessionExpiryHook::new(self.session.clone(), Arc::clone(&self.navigator));
        match self.client.install(Arc::new(hook)) {
            Ok(live) => *registration = Some(live),
            Err(e) => warn!(error = %e, "could not attach response interceptor"),
        }
    }

    /// Apply a validation outcome, unless it is stale.
    ///
    /// Stale means the credential changed (epoch moved) or the guard was
    /// deactivated (generation moved) while the call was in flight; such
    /// a result belongs to a world that no longer exists and must not
    /// mutate anything or redirect anyone. The check here is an early
    /// discard only - the session-mutating arms re-check the epoch under
    /// the session lock itself, so a login racing in after this point
    /// still wins.
    fn settle(&self, outcome: ValidationOutcome, generation: u64, epoch: u64) -> Gate {
        if self.generation.load(Ordering::SeqCst) != generation
            || self.session.epoch() != epoch
        {
            debug!("discarding validation result for a superseded credential");
            return self.gate();
        }

        match outcome {
            ValidationOutcome::Valid(principal) => {
                if !self.session.confirm_principal_if_epoch(&principal, epoch) {
                    debug!("discarding principal for a superseded credential");
                    return self.gate();
                }
                info!(principal = %principal, "credential validated; gate open");
                self.set_gate(Gate::Allowed);
                Gate::Allowed
            }
            ValidationOutcome::Invalid(reason) => {
                if !self.session.logout_if_epoch(epoch) {
                    // The session moved on while this rejection was in
                    // flight; whoever moved it owns the state and any
                    // redirect.
                    debug!("discarding rejection for a superseded credential");
                    return self.gate();
                }
                info!(reason = %reason, "credential rejected; ending session");
                self.set_gate(Gate::Denied);
                self.navigator.redirect_to_login();
                Gate::Denied
            }
            ValidationOutcome::NetworkError(reason) => {
                // Validity unknown: deny this activation but keep the
                // credential so a retry with connectivity restored can
                // still recover the session.
                warn!(reason = %reason, "validation unreachable; denying without logout");
                self.set_gate(Gate::Denied);
                self.navigator.redirect_to_login();
                Gate::Denied
            }
        }
    }
}
