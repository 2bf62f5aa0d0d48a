use shared_utils::config::ConfigError;
use thiserror::Error;
use underlying_ingestor::providers::{ProviderError, ProviderInitError};

use crate::{
    auth::AuthError,
    db::{DbError, OpenError},
    loader::DeleteScopeError,
    normalize::NormalizeError,
};

/// Everything that can end a run. Each variant maps to exit code 1.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("vendor client setup failed: {0}")]
    VendorInit(#[from] ProviderInitError),

    #[error("vendor fetch failed: {0}")]
    VendorFetch(#[from] ProviderError),

    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("refusing to load: {0}")]
    DeleteScope(#[from] DeleteScopeError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl From<OpenError> for EtlError {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Auth(e) => Self::Auth(e),
            OpenError::Db(e) => Self::Database(e),
        }
    }
}
