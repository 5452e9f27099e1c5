//! Session authentication guard for dashboard clients of a remote REST
//! service.
//!
//! Everything here exists to keep three things consistent under races
//! and network failure: the in-memory session, the persisted credential,
//! and the decision whether protected content may render. The crate
//! provides:
//!
//! - [`auth::CredentialStore`] / [`auth::Session`]: the credential
//!   mirrored between memory and durable storage, mutated only through
//!   the `login`/`logout` transitions
//! - [`api::RemoteValidator`]: one-shot "is this credential still good"
//!   check against the backend
//! - [`api::HttpClient`] / [`api::SessionExpiryHook`]: the shared client
//!   every screen sends traffic through, with a single hook that ends
//!   the session on any 401/403 response
//! - [`guard::RouteGuard`]: the gate that ties the above together in
//!   front of protected views
//!
//! Screens and their CRUD logic are consumers: they read the session,
//! send requests through the shared client, and get redirected by the
//! guard; nothing in this crate renders anything.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;

pub use api::{
    AuthError, HttpClient, InterceptorRegistration, RemoteValidator, ResponseHook,
    SessionExpiryHook, Validate, ValidationOutcome,
};
pub use auth::{Credential, CredentialStore, FileStorage, KeyringStorage, MemoryStorage, Session};
pub use config::Config;
pub use guard::{Gate, Navigator, RouteGuard};
