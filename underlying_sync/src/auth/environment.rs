//! Service principal credential from `AZURE_*` variables.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::EnvSource;
use tracing::debug;

use crate::auth::{AccessToken, AuthError, TokenCredential, read_token_response};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const NAME: &str = "EnvironmentCredential";

#[derive(Debug)]
struct ServicePrincipal {
    tenant_id: String,
    client_id: String,
    client_secret: SecretString,
}

/// Client-credentials grant against the Microsoft identity platform.
///
/// Reports [`AuthError::Unavailable`] when any of `AZURE_TENANT_ID`,
/// `AZURE_CLIENT_ID` or `AZURE_CLIENT_SECRET` is unset.
pub struct EnvironmentCredential {
    client: Client,
    authority_host: String,
    principal: Result<ServicePrincipal, Vec<&'static str>>,
}

impl EnvironmentCredential {
    pub fn from_env(env: &impl EnvSource) -> Result<Self, AuthError> {
        let tenant_id = env.optional("AZURE_TENANT_ID");
        let client_id = env.optional("AZURE_CLIENT_ID");
        let client_secret = env.optional("AZURE_CLIENT_SECRET");

        let principal = match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(secret)) => Ok(ServicePrincipal {
                tenant_id,
                client_id,
                client_secret: SecretString::from(secret),
            }),
            (t, c, s) => Err([
                ("AZURE_TENANT_ID", t.is_none()),
                ("AZURE_CLIENT_ID", c.is_none()),
                ("AZURE_CLIENT_SECRET", s.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect()),
        };

        let authority_host = env
            .optional("AZURE_AUTHORITY_HOST")
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());

        Ok(Self {
            client: build_client()?,
            authority_host,
            principal,
        })
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            tenant_id
        )
    }
}

fn build_client() -> Result<Client, AuthError> {
    Client::builder()
        .build()
        .map_err(|source| AuthError::ClientBuild {
            credential: NAME,
            source,
        })
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let principal = self.principal.as_ref().map_err(|missing| AuthError::Unavailable {
            credential: NAME,
            reason: format!("{} not set", missing.join(", ")),
        })?;

        let url = self.token_url(&principal.tenant_id);
        debug!(%url, client_id = %principal.client_id, "requesting client-credentials token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", principal.client_id.as_str()),
                ("client_secret", principal.client_secret.expose_secret()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|source| AuthError::Request {
                credential: NAME,
                source,
            })?;

        read_token_response(NAME, response).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::auth::DATABASE_SCOPE;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[tokio::test]
    async fn missing_variables_are_listed() {
        let cred = EnvironmentCredential::from_env(&env(&[("AZURE_CLIENT_ID", "app")])).unwrap();
        match cred.get_token(DATABASE_SCOPE).await {
            Err(AuthError::Unavailable { credential, reason }) => {
                assert_eq!(credential, "EnvironmentCredential");
                assert_eq!(reason, "AZURE_TENANT_ID, AZURE_CLIENT_SECRET not set");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn token_url_uses_authority_host() {
        let cred = EnvironmentCredential::from_env(&env(&[(
            "AZURE_AUTHORITY_HOST",
            "https://login.example.com/",
        )]))
        .unwrap();
        assert_eq!(
            cred.token_url("tenant"),
            "https://login.example.com/tenant/oauth2/v2.0/token"
        );
    }
}
