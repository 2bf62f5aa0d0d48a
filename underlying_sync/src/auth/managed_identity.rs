//! Managed identity: App Service / Functions style endpoint or the instance
//! metadata service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::EnvSource;
use tracing::debug;

use crate::auth::{
    AccessToken, AuthError, TokenCredential, error_message, read_token_response,
    scope_to_resource,
};

pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

const NAME: &str = "ManagedIdentityCredential";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";
const IMDS_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Source {
    AppService {
        endpoint: String,
        header: SecretString,
    },
    Imds {
        endpoint: String,
    },
}

pub struct ManagedIdentityCredential {
    client: Client,
    source: Source,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// Picks the App Service endpoint when `IDENTITY_ENDPOINT` and
    /// `IDENTITY_HEADER` are set, the metadata service otherwise.
    /// `AZURE_CLIENT_ID` selects a user-assigned identity.
    pub fn from_env(env: &impl EnvSource) -> Result<Self, AuthError> {
        let client_id = env.optional("AZURE_CLIENT_ID");
        let source = match (env.optional("IDENTITY_ENDPOINT"), env.optional("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => Source::AppService {
                endpoint,
                header: SecretString::from(header),
            },
            _ => Source::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        };
        Self::with_source(source, client_id)
    }

    /// Metadata-service credential against a custom endpoint.
    pub fn imds_at(endpoint: &str, client_id: Option<String>) -> Result<Self, AuthError> {
        Self::with_source(
            Source::Imds {
                endpoint: endpoint.to_string(),
            },
            client_id,
        )
    }

    fn with_source(source: Source, client_id: Option<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .connect_timeout(IMDS_CONNECT_TIMEOUT)
            .build()
            .map_err(|source| AuthError::ClientBuild {
                credential: NAME,
                source,
            })?;
        Ok(Self {
            client,
            source,
            client_id,
        })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let resource = scope_to_resource(scope);
        let mut query = vec![("resource", resource)];
        if let Some(id) = &self.client_id {
            query.push(("client_id", id.as_str()));
        }

        match &self.source {
            Source::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                debug!(%endpoint, "requesting App Service managed identity token");

                let response = self
                    .client
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header.expose_secret())
                    .query(&query)
                    .send()
                    .await
                    .map_err(|source| AuthError::Request {
                        credential: NAME,
                        source,
                    })?;
                read_token_response(NAME, response).await
            }
            Source::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                debug!(%endpoint, "requesting metadata service managed identity token");

                let response = self
                    .client
                    .get(endpoint)
                    .header("Metadata", "true")
                    .query(&query)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_connect() || e.is_timeout() {
                            AuthError::Unavailable {
                                credential: NAME,
                                reason: "metadata endpoint unreachable".to_string(),
                            }
                        } else {
                            AuthError::Request {
                                credential: NAME,
                                source: e,
                            }
                        }
                    })?;

                // 400 means this host has no identity assigned.
                if response.status() == StatusCode::BAD_REQUEST {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AuthError::Unavailable {
                        credential: NAME,
                        reason: error_message(status, &body),
                    });
                }
                read_token_response(NAME, response).await
            }
        }
    }
}
