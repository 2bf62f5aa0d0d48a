use thiserror::Error;

/// Errors related to application configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable required by the application is not set (or is blank).
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set but its value cannot be used.
    #[error("Invalid value for {name} ({value:?}): {reason}")]
    InvalidValue {
        /// Name of the offending variable.
        name: String,
        /// The raw value as read.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(name: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
