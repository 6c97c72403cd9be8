//! Typed environment variable parsing.
//!
//! Services read their configuration from the process environment. Every
//! variable has a default that applies when it is unset or blank; a value
//! that is present but does not parse is an error rather than a silent
//! fallback.

use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Error raised while reading configuration from the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// Variable is set but cannot be parsed into the expected type.
    #[error("Invalid {name}: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

impl EnvError {
    /// Create an invalid-value error for the given variable.
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Display) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Parse a process environment variable, falling back to `default`.
///
/// # Errors
///
/// Returns [`EnvError::Invalid`] if the variable is set but does not parse.
pub fn parse_env<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_env_from(&|key: &str| std::env::var(key).ok(), name, default)
}

/// Parse a variable obtained through `lookup`, falling back to `default`.
///
/// `lookup` abstracts the environment so callers can feed values from a map
/// in tests.
///
/// # Errors
///
/// Returns [`EnvError::Invalid`] if the variable is set but does not parse.
pub fn parse_env_from<T, F>(lookup: &F, name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| EnvError::invalid(name, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_uses_default() {
        let lookup = lookup_from(&[]);
        assert_eq!(parse_env_from(&lookup, "PORT", 8080u16).unwrap(), 8080);
    }

    #[test]
    fn test_blank_uses_default() {
        let lookup = lookup_from(&[("PORT", "  ")]);
        assert_eq!(parse_env_from(&lookup, "PORT", 8080u16).unwrap(), 8080);
    }

    #[test]
    fn test_present_value_is_parsed_and_trimmed() {
        let lookup = lookup_from(&[("PORT", " 9090 ")]);
        assert_eq!(parse_env_from(&lookup, "PORT", 8080u16).unwrap(), 9090);
    }

    #[test]
    fn test_invalid_value_is_an_error() {
        let lookup = lookup_from(&[("PORT", "not-a-port")]);
        let err = parse_env_from(&lookup, "PORT", 8080u16).unwrap_err();
        assert!(err.to_string().starts_with("Invalid PORT"));
    }
}
