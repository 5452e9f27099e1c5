//! HTTP layer: the shared client, the validation endpoint, and the
//! session expiry interceptor.
//!
//! This module provides:
//! - `HttpClient`: the one client every screen sends requests through,
//!   with a single observer slot for response statuses
//! - `RemoteValidator`: one-shot credential validation against the
//!   backend whoami endpoint
//! - `SessionExpiryHook`: ends the session when any response comes back
//!   401/403
//!
//! The backend uses bearer token authentication on every request.

pub mod client;
pub mod error;
pub mod interceptor;
pub mod validator;

pub use client::{HttpClient, InterceptorRegistration, ResponseHook};
pub use error::AuthError;
pub use interceptor::SessionExpiryHook;
pub use validator::{RemoteValidator, Validate, ValidationOutcome};
