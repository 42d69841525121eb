use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading configuration from the process environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but its value could not be parsed.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Raw value as found in the environment.
        value: String,
    },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    std::env::var(name).map_err(|_| EnvError::Missing(name.to_string()))
}

/// Reads an optional environment variable. Unset and empty values both yield `None`.
pub fn get_env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset or blank, and
/// [`EnvError::Invalid`] when it is set to something `T` cannot parse.
pub fn get_env_parsed<T: FromStr>(name: &str) -> Result<Option<T>, EnvError> {
    match get_env_opt(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| EnvError::Invalid {
            name: name.to_string(),
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = get_env_var("SHARED_UTILS_TEST_SURELY_UNSET").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_TEST_SURELY_UNSET"
        );
    }

    #[test]
    fn unset_optional_variable_parses_to_none() {
        let got: Option<u32> = get_env_parsed("SHARED_UTILS_TEST_ALSO_UNSET").unwrap();
        assert_eq!(got, None);
    }
}
