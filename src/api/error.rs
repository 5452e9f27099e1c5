use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// No credential at all - a normal unauthenticated state, surfaced as
    /// a typed early-out rather than a failure.
    #[error("no credential present")]
    CredentialMissing,

    /// The backend explicitly rejected the credential (401/403). The
    /// credential is dead and the caller must clear it.
    #[error("credential rejected by backend: {0}")]
    CredentialInvalid(String),

    /// The call could not complete; the credential's validity is unknown.
    /// Never to be conflated with `CredentialInvalid` - the network being
    /// down is not a reason to log anyone out.
    #[error("could not reach the backend: {0}")]
    Network(String),

    /// A second interceptor installation while one is live. Lifecycle
    /// violation - the registration handle prevents this structurally.
    #[error("a response interceptor is already installed")]
    InterceptorInstalled,

    #[error("credential storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
