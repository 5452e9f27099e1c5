//! Remote credential validation against the backend whoami endpoint.
//!
//! One idempotent round trip per call: the credential goes out as a
//! bearer header, the outcome comes back as a `ValidationOutcome`. The
//! validator never mutates session state and never retries - retry
//! policy, if any, belongs to the caller.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::config::Config;

/// Maximum length of a rejection body kept in the outcome reason
const MAX_REASON_LENGTH: usize = 500;

/// Result of a single validation attempt. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The backend recognized the credential and returned the principal.
    Valid(String),
    /// The backend explicitly rejected the credential (401/403).
    Invalid(String),
    /// The call could not complete; validity is unknown.
    NetworkError(String),
}

#[derive(Debug, Deserialize)]
struct WhoamiResponse {
    #[serde(alias = "userName", alias = "name")]
    username: String,
}

/// Collaborator seam for the route guard; production uses
/// `RemoteValidator`, tests substitute a scripted implementation.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(&self, credential: &Credential) -> ValidationOutcome;
}

/// Validator backed by the real backend endpoint.
/// Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct RemoteValidator {
    client: Client,
    whoami_url: String,
}

impl RemoteValidator {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            whoami_url: config.whoami_url(),
        })
    }

    fn truncate_reason(body: &str) -> String {
        if body.len() <= MAX_REASON_LENGTH {
            return body.to_string();
        }
        // Back the cut up to a char boundary; rejection bodies are
        // arbitrary text (HTML error pages included) and a fixed byte
        // offset can land inside a multi-byte character.
        let mut cut = MAX_REASON_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    /// Map a non-2xx status to an outcome. Only an explicit 401/403 marks
    /// the credential dead; everything else leaves its validity unknown.
    fn classify_failure(status: StatusCode, body: &str) -> ValidationOutcome {
        match status.as_u16() {
            401 | 403 => ValidationOutcome::Invalid(Self::truncate_reason(body)),
            _ => ValidationOutcome::NetworkError(format!(
                "unexpected status {}: {}",
                status,
                Self::truncate_reason(body)
            )),
        }
    }
}

#[async_trait]
impl Validate for RemoteValidator {
    async fn validate(&self, credential: &Credential) -> ValidationOutcome {
        let response = match self
            .client
            .get(&self.whoami_url)
            .bearer_auth(credential.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "validation request could not complete");
                return ValidationOutcome::NetworkError(e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            match response.json::<WhoamiResponse>().await {
                Ok(whoami) => {
                    debug!(principal = %whoami.username, "credential validated");
                    ValidationOutcome::Valid(whoami.username)
                }
                Err(e) => ValidationOutcome::NetworkError(format!(
                    "malformed whoami payload: {e}"
                )),
            }
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "validation rejected or inconclusive");
            Self::classify_failure(status, &body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_401_and_403_as_invalid() {
        assert!(matches!(
            RemoteValidator::classify_failure(StatusCode::UNAUTHORIZED, "expired"),
            ValidationOutcome::Invalid(_)
        ));
        assert!(matches!(
            RemoteValidator::classify_failure(StatusCode::FORBIDDEN, "revoked"),
            ValidationOutcome::Invalid(_)
        ));
    }

    #[test]
    fn test_classify_other_statuses_as_network_error() {
        // A 500 or 502 says nothing about the credential.
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::NOT_FOUND,
        ] {
            assert!(matches!(
                RemoteValidator::classify_failure(status, ""),
                ValidationOutcome::NetworkError(_)
            ));
        }
    }

    #[test]
    fn test_truncate_reason_caps_long_bodies() {
        let long = "x".repeat(2 * MAX_REASON_LENGTH);
        let reason = RemoteValidator::truncate_reason(&long);
        assert!(reason.len() < long.len());
        assert!(reason.contains("truncated"));

        let short = "nope";
        assert_eq!(RemoteValidator::truncate_reason(short), short);
    }

    #[test]
    fn test_truncate_reason_respects_char_boundaries() {
        // 499 ASCII bytes then 3-byte characters puts the cut mid-char.
        let mut body = "x".repeat(MAX_REASON_LENGTH - 1);
        body.push_str(&"\u{20ac}".repeat(20));

        let reason = RemoteValidator::truncate_reason(&body);
        assert!(reason.contains("truncated"));
        assert!(reason.starts_with(&"x".repeat(MAX_REASON_LENGTH - 1)));
    }
}
