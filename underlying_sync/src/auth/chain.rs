use async_trait::async_trait;
use shared_utils::env::EnvSource;
use tracing::{debug, info};

use crate::auth::{
    AccessToken, AuthError, AzureCliCredential, EnvironmentCredential,
    ManagedIdentityCredential, TokenCredential,
};

/// Tries each credential in order. Unavailable sources are skipped; the
/// first real failure ends the search.
pub struct ChainedCredential {
    sources: Vec<Box<dyn TokenCredential>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { sources }
    }
}

/// Environment, then managed identity, then Azure CLI.
pub fn default_credential(env: &impl EnvSource) -> Result<ChainedCredential, AuthError> {
    Ok(ChainedCredential::new(vec![
        Box::new(EnvironmentCredential::from_env(env)?),
        Box::new(ManagedIdentityCredential::from_env(env)?),
        Box::new(AzureCliCredential::default()),
    ]))
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "DefaultCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let mut reasons = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(credential = source.name(), "acquired database access token");
                    return Ok(token);
                }
                Err(AuthError::Unavailable { credential, reason }) => {
                    debug!(credential, %reason, "credential unavailable");
                    reasons.push(format!("{credential}: {reason}"));
                }
                Err(e) => return Err(e),
            }
        }
        Err(AuthError::Exhausted(reasons))
    }
}
