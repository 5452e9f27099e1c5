//! Shared HTTP client used by every screen in the application.
//!
//! The client wraps `reqwest::Client` and adds two things: a bearer
//! header sourced from the current session, and a single observer slot
//! through which every response status flows. The slot holds at most one
//! hook; installation returns an `InterceptorRegistration` whose drop
//! detaches the hook, so a registration cannot outlive its guard and two
//! hooks can never observe the same response.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::AuthError;
use crate::auth::Session;
use crate::config::Config;

/// Observer of response statuses flowing through the shared client.
pub trait ResponseHook: Send + Sync {
    fn on_status(&self, status: StatusCode);
}

type HookSlot = Arc<Mutex<Option<Arc<dyn ResponseHook>>>>;

fn lock_slot(slot: &HookSlot) -> std::sync::MutexGuard<'_, Option<Arc<dyn ResponseHook>>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shared HTTP client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and clones share the same hook slot.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    session: Session,
    hook: HookSlot,
}

impl HttpClient {
    pub fn new(config: &Config, session: Session) -> anyhow::Result<Self> {
        let inner = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            inner,
            session,
            hook: Arc::new(Mutex::new(None)),
        })
    }

    /// Attach a response hook. At most one may be live; a second
    /// installation while the first registration is alive is refused.
    pub fn install(
        &self,
        hook: Arc<dyn ResponseHook>,
    ) -> Result<InterceptorRegistration, AuthError> {
        let mut slot = lock_slot(&self.hook);
        if slot.is_some() {
            return Err(AuthError::InterceptorInstalled);
        }
        *slot = Some(hook);
        debug!("response interceptor installed");
        Ok(InterceptorRegistration {
            slot: Arc::clone(&self.hook),
        })
    }

    /// Build a request with the session's bearer header attached when a
    /// credential is present.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.inner.request(method, url);
        match self.session.credential() {
            Some(credential) => builder.bearer_auth(credential.as_str()),
            None => builder,
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Send a request, letting the installed hook observe the response
    /// status. The response and any transport error pass through
    /// unchanged - the hook observes, it does not swallow.
    pub async fn execute(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        let response = request.send().await?;
        let hook = lock_slot(&self.hook).clone();
        if let Some(hook) = hook {
            hook.on_status(response.status());
        }
        Ok(response)
    }

    #[cfg(test)]
    pub(crate) fn notify_status(&self, status: StatusCode) {
        let hook = lock_slot(&self.hook).clone();
        if let Some(hook) = hook {
            hook.on_status(status);
        }
    }

    #[cfg(test)]
    pub(crate) fn hook_installed(&self) -> bool {
        lock_slot(&self.hook).is_some()
    }
}

/// Live attachment of a hook to the shared client.
///
/// Holding the registration keeps the hook observing; dropping it (or
/// calling `uninstall`) detaches the hook on every exit path, normal or
/// abnormal.
pub struct InterceptorRegistration {
    slot: HookSlot,
}

impl InterceptorRegistration {
    pub fn uninstall(self) {
        // Drop does the detaching.
    }
}

impl Drop for InterceptorRegistration {
    fn drop(&mut self) {
        *lock_slot(&self.slot) = None;
        debug!("response interceptor removed");
    }
}
