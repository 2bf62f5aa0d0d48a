//! Token from a logged-in Azure CLI.

use std::io;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::auth::{AccessToken, AuthError, TokenCredential, parse_token_value, scope_to_resource};

const NAME: &str = "AzureCliCredential";

#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self::with_program(program)
    }
}

impl AzureCliCredential {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let resource = scope_to_resource(scope);
        debug!(program = %self.program, %resource, "asking Azure CLI for a token");

        let output = Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--resource", resource])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AuthError::Unavailable {
                credential: NAME,
                reason: if e.kind() == io::ErrorKind::NotFound {
                    "Azure CLI not installed".to_string()
                } else {
                    format!("failed to run {}: {e}", self.program)
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("az login") || stderr.contains("not recognized") {
                return Err(AuthError::Unavailable {
                    credential: NAME,
                    reason: "not logged in; run `az login`".to_string(),
                });
            }
            return Err(AuthError::Rejected {
                credential: NAME,
                message: stderr,
            });
        }

        let value: Value = serde_json::from_slice(&output.stdout).map_err(|e| AuthError::Malformed {
            credential: NAME,
            message: e.to_string(),
        })?;
        parse_token_value(NAME, &value, Utc::now())
    }
}
