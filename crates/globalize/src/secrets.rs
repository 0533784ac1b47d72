//! Secret resolution for service credentials.
//!
//! A credential can be given in three ways, checked in priority order:
//!
//! 1. **Direct value** - for quick local runs (`"apiKey": "..."`)
//! 2. **File reference** - Docker secrets pattern (`"apiKeyFile": "/run/secrets/gemini"`)
//! 3. **Env var reference** - the conventional variable (`"apiKeyEnvVar": "GEMINI_API_KEY"`)
//!
//! Resolved values are wrapped in [`SecretString`] so they never reach a
//! `Debug` or log line by accident.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where to find one credential. Deserialized from config as
/// `{ "value": ..., "file": ..., "envVar": ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretSource {
    /// Source that reads a single environment variable.
    pub fn env(name: &str) -> Self {
        Self {
            env_var: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Resolves the credential; an unset or empty env var counts as absent.
    pub fn resolve(&self) -> Result<Option<SecretString>> {
        match resolve_secret_optional(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        ) {
            Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
            other => other,
        }
    }
}

/// Resolves a secret from the first non-empty source: direct value, then
/// file contents, then environment variable. Values are trimmed.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|e| SecretError::FileReadError {
                path: expanded,
                source: e,
            });
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim())),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Resolves a secret, returning None if no source is provided instead of an error.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the user's home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("GLOBALIZE_TEST_SECRET_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("GLOBALIZE_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("GLOBALIZE_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        std::env::set_var("GLOBALIZE_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("GLOBALIZE_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("GLOBALIZE_TEST_SECRET_2");
    }

    #[test]
    fn test_no_source_error() {
        let result = resolve_secret(None, None, None);
        assert!(matches!(result, Err(SecretError::NoSourceProvided)));
    }

    #[test]
    fn test_file_not_found_error() {
        let result = resolve_secret(None, Some("/nonexistent/path/to/secret"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    #[serial]
    fn test_empty_env_value_counts_as_unset() {
        std::env::set_var("GLOBALIZE_TEST_SECRET_3", "   ");
        let result = resolve_secret(None, None, Some("GLOBALIZE_TEST_SECRET_3"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
        std::env::remove_var("GLOBALIZE_TEST_SECRET_3");
    }

    #[test]
    #[serial]
    fn test_source_resolve_treats_missing_env_as_absent() {
        std::env::remove_var("GLOBALIZE_TEST_SECRET_4");
        let source = SecretSource::env("GLOBALIZE_TEST_SECRET_4");
        assert!(source.resolve().unwrap().is_none());

        std::env::set_var("GLOBALIZE_TEST_SECRET_4", "key-123\n");
        let resolved = source.resolve().unwrap().unwrap();
        assert_eq!(resolved.expose_secret(), "key-123");
        std::env::remove_var("GLOBALIZE_TEST_SECRET_4");
    }

    #[test]
    fn test_source_deserializes_camel_case() {
        let source: SecretSource =
            serde_json::from_str(r#"{"file": "/run/secrets/token", "envVar": "GITHUB_TOKEN"}"#)
                .unwrap();
        assert_eq!(source.file.as_deref(), Some("/run/secrets/token"));
        assert_eq!(source.env_var.as_deref(), Some("GITHUB_TOKEN"));
        assert!(source.value.is_none());
    }
}
