//! Environment-variable lookups.
//!
//! Values are read through [`EnvSource`] so that resolution code can be driven
//! by the real process environment ([`ProcessEnv`]) or by a plain closure in
//! tests. A variable that is set but blank is treated exactly like an unset
//! one.

use crate::config::ConfigError;

/// Something that can answer "what is the value of variable `name`?".
pub trait EnvSource {
    /// Raw lookup. `None` when the variable is not set.
    fn get(&self, name: &str) -> Option<String>;

    /// Trimmed, non-empty value of `name`, if any.
    fn optional(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Like [`EnvSource::optional`] but a missing value is an error.
    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl<F> EnvSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, ConfigError> {
    ProcessEnv.require(name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serial_test::serial;

    use super::*;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn blank_values_count_as_missing() {
        let env = source(&[("A", "  "), ("B", "")]);
        assert_eq!(env.optional("A"), None);
        assert_eq!(
            env.require("B"),
            Err(ConfigError::MissingEnvVar("B".to_string()))
        );
        assert_eq!(
            env.require("C"),
            Err(ConfigError::MissingEnvVar("C".to_string()))
        );
    }

    #[test]
    fn values_are_trimmed() {
        let env = source(&[("A", " value \n")]);
        assert_eq!(env.require("A").unwrap(), "value");
    }

    #[test]
    #[serial]
    fn process_env_reads_real_variables() {
        let name = "SHARED_UTILS_TEST_VARIABLE";
        // SAFETY: serialized with the other env-mutating tests.
        unsafe { std::env::set_var(name, "present") };
        assert_eq!(get_env_var(name).unwrap(), "present");

        unsafe { std::env::remove_var(name) };
        assert!(matches!(
            get_env_var(name),
            Err(ConfigError::MissingEnvVar(n)) if n == name
        ));
    }
}
