//! Azure AD access tokens for the database connection.
//!
//! [`TokenCredential`] is the seam: the pipeline only ever asks for one
//! token per run through it. [`default_credential`] builds the usual
//! environment, managed identity, Azure CLI chain.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;

pub mod attribute;
pub mod azure_cli;
pub mod chain;
pub mod environment;
pub mod managed_identity;

pub use attribute::{ConnectAttribute, SQL_COPT_SS_ACCESS_TOKEN, pack_access_token};
pub use azure_cli::AzureCliCredential;
pub use chain::{ChainedCredential, default_credential};
pub use environment::EnvironmentCredential;
pub use managed_identity::ManagedIdentityCredential;

/// Scope requested for Azure SQL.
pub const DATABASE_SCOPE: &str = "https://database.windows.net/.default";

#[derive(Debug, Error)]
pub enum AuthError {
    /// The credential is not configured or cannot be reached here. A chain
    /// moves on to its next source.
    #[error("{credential} unavailable: {reason}")]
    Unavailable {
        credential: &'static str,
        reason: String,
    },

    #[error("{credential} token request failed")]
    Request {
        credential: &'static str,
        source: reqwest::Error,
    },

    #[error("{credential} rejected the token request: {message}")]
    Rejected {
        credential: &'static str,
        message: String,
    },

    #[error("{credential} returned an unusable token response: {message}")]
    Malformed {
        credential: &'static str,
        message: String,
    },

    #[error("failed to build HTTP client for {credential}")]
    ClientBuild {
        credential: &'static str,
        source: reqwest::Error,
    },

    #[error("no credential could provide a token ({})", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// A bearer token. The secret is never printed by `Debug`.
#[derive(Debug)]
pub struct AccessToken {
    token: SecretString,
    expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: String, expires_on: Option<DateTime<Utc>>) -> Self {
        Self {
            token: SecretString::from(token),
            expires_on,
        }
    }

    pub fn secret(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.expires_on
    }

    /// The token in the layout ODBC drivers expect for
    /// [`SQL_COPT_SS_ACCESS_TOKEN`]. Interop helper: the TDS client used
    /// for loading takes [`AccessToken::secret`] directly, so only the
    /// packed size is logged at connect time.
    pub fn to_connect_attribute(&self) -> ConnectAttribute {
        pack_access_token(self.secret())
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError>;
}

/// v1-style `resource` for a v2 `scope` (`https://x/.default` -> `https://x`).
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Reads a token out of any of the JSON shapes the identity endpoints use.
///
/// Accepts `access_token` or `accessToken`, and an expiry given either as
/// absolute `expires_on` epoch seconds or relative `expires_in`, each as a
/// number or a numeric string.
pub(crate) fn parse_token_value(
    credential: &'static str,
    body: &Value,
    now: DateTime<Utc>,
) -> Result<AccessToken, AuthError> {
    let token = body
        .get("access_token")
        .or_else(|| body.get("accessToken"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Malformed {
            credential,
            message: "no access token in response".to_string(),
        })?;

    let expires_on = seconds(body.get("expires_on"))
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .or_else(|| seconds(body.get("expires_in")).map(|s| now + Duration::seconds(s)));

    Ok(AccessToken::new(token.to_string(), expires_on))
}

fn seconds(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Turns an HTTP token response into an [`AccessToken`].
pub(crate) async fn read_token_response(
    credential: &'static str,
    response: reqwest::Response,
) -> Result<AccessToken, AuthError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| AuthError::Request { credential, source })?;

    if !status.is_success() {
        return Err(AuthError::Rejected {
            credential,
            message: error_message(status, &body),
        });
    }

    let value: Value = serde_json::from_str(&body).map_err(|e| AuthError::Malformed {
        credential,
        message: e.to_string(),
    })?;
    parse_token_value(credential, &value, Utc::now())
}

/// Best human-readable message from an error response.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let described = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        v.get("error_description")
            .or_else(|| v.get("message"))
            .or_else(|| v.pointer("/error/message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match described {
        Some(d) => format!("HTTP {}: {d}", status.as_u16()),
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => format!("HTTP {}: {}", status.as_u16(), body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn resource_from_scope() {
        assert_eq!(scope_to_resource(DATABASE_SCOPE), "https://database.windows.net");
        assert_eq!(scope_to_resource("https://x"), "https://x");
    }

    #[test]
    fn token_with_relative_expiry() {
        let t = parse_token_value(
            "test",
            &json!({"token_type": "Bearer", "expires_in": 3599, "access_token": "abc"}),
            now(),
        )
        .unwrap();
        assert_eq!(t.secret(), "abc");
        assert_eq!(t.expires_on(), Some(now() + Duration::seconds(3599)));
    }

    #[test]
    fn token_with_absolute_string_expiry_wins() {
        let t = parse_token_value(
            "test",
            &json!({"access_token": "abc", "expires_on": "1704459600", "expires_in": "10"}),
            now(),
        )
        .unwrap();
        assert_eq!(t.expires_on(), Some(Utc.with_ymd_and_hms(2024, 1, 5, 13, 0, 0).unwrap()));
    }

    #[test]
    fn cli_shape_and_missing_token() {
        let t = parse_token_value(
            "test",
            &json!({"accessToken": "cli", "expiresOn": "2024-01-05 13:00:00.000000"}),
            now(),
        )
        .unwrap();
        assert_eq!(t.secret(), "cli");
        assert_eq!(t.expires_on(), None);

        let err = parse_token_value("test", &json!({"token_type": "Bearer"}), now()).unwrap_err();
        assert!(matches!(err, AuthError::Malformed { credential: "test", .. }));
    }

    #[test]
    fn debug_does_not_leak_the_token() {
        let t = AccessToken::new("super-secret".into(), None);
        assert!(!format!("{t:?}").contains("super-secret"));
    }

    #[test]
    fn error_messages_prefer_descriptions() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(
            error_message(status, r#"{"error":"invalid_client","error_description":"bad secret"}"#),
            "HTTP 401: bad secret"
        );
        assert_eq!(error_message(status, "nope"), "HTTP 401: nope");
        assert_eq!(error_message(status, ""), "HTTP 401 Unauthorized");
    }
}
