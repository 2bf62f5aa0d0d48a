use async_trait::async_trait;
use reqwest::{Client, Url, header};
use secrecy::{ExposeSecret, SecretString};
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    models::{RowSet, UnderlyingInfoParams},
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, EmptyApiKeySnafu, InvalidBaseUrlSnafu,
        ProviderError, ProviderInitError, ReqwestSnafu,
        ivol_rest::{
            params::{UNDERLYING_INFO_PATH, construct_params},
            response::parse_body,
        },
    },
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://restapi.ivolatility.com";

/// An authenticated IVolatility client. The API key travels with the client;
/// there is no process-wide login.
pub struct IvolProvider {
    client: Client,
    api_key: SecretString,
    endpoint: Url,
}

impl IvolProvider {
    /// Creates a provider against the production API.
    pub fn new(api_key: SecretString) -> Result<Self, ProviderInitError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Creates a provider against an alternative API root (staging, a local
    /// stub).
    pub fn with_base_url(api_key: SecretString, base_url: &str) -> Result<Self, ProviderInitError> {
        ensure!(!api_key.expose_secret().trim().is_empty(), EmptyApiKeySnafu);

        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), UNDERLYING_INFO_PATH);
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            InvalidBaseUrlSnafu {
                url: base_url.to_string(),
                message: e.to_string(),
            }
            .build()
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/csv;q=0.9"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DataProvider for IvolProvider {
    async fn fetch_underlying_info(
        &self,
        params: &UnderlyingInfoParams,
    ) -> Result<RowSet, ProviderError> {
        let query_params = construct_params(params);
        debug!(endpoint = %self.endpoint, ?query_params, "requesting underlying info");

        // reqwest errors embed the request URL, which carries the key.
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&query_params)
            .query(&[("apiKey", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context(ReqwestSnafu)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .context(ReqwestSnafu)?;

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown API error")
                    .to_string()
            } else {
                body
            };
            return ApiSnafu {
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        let rows = parse_body(content_type.as_deref(), &body)?;
        debug!(rows = rows.len(), columns = rows.columns().len(), "decoded underlying info");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_path() {
        let provider =
            IvolProvider::with_base_url(SecretString::from("key".to_string()), "http://localhost:8080/").unwrap();
        assert_eq!(
            provider.endpoint().as_str(),
            "http://localhost:8080/equities/underlying-info"
        );
    }

    #[test]
    fn rejects_blank_key_and_bad_url() {
        assert!(matches!(
            IvolProvider::new(SecretString::from("  ".to_string())),
            Err(ProviderInitError::EmptyApiKey { .. })
        ));
        assert!(matches!(
            IvolProvider::with_base_url(SecretString::from("key".to_string()), "not a url"),
            Err(ProviderInitError::InvalidBaseUrl { .. })
        ));
    }
}
