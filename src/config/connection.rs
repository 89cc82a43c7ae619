//! Gemini connection settings.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ConfigError, Result};
use crate::api::auth;

/// Environment variable that overrides the stored password.
pub const PASSWORD_ENV_VAR: &str = "GEMINI_PASSWORD";

/// How to reach and authenticate with a Gemini server.
///
/// The password may be left out of the file and kept in the OS keyring or
/// the `GEMINI_PASSWORD` environment variable instead.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// The Gemini server URL, e.g. "http://gemini:8080".
    pub base_url: String,

    /// The Gemini user name.
    pub username: String,

    /// The password, if stored in the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ConnectionSettings {
    /// Create new connection settings.
    pub fn new(base_url: &str, username: &str, password: Option<&str>) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.map(str::to_string),
        }
    }

    /// Validate these settings.
    ///
    /// The URL and user name are required; the password is not.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server URL cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "server URL '{}' must start with http:// or https://",
                self.base_url
            )));
        }

        if self.username.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "user name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Find the password to authenticate with.
    ///
    /// Looks at the `GEMINI_PASSWORD` environment variable, then the config
    /// file, then the OS keyring. Falls back to an empty password, which
    /// Gemini accepts for accounts without one.
    pub fn resolve_password(&self) -> String {
        if let Ok(password) = std::env::var(PASSWORD_ENV_VAR) {
            return password;
        }

        if let Some(password) = &self.password {
            return password.clone();
        }

        match auth::get_password(&self.username) {
            Ok(password) => password,
            Err(e) => {
                debug!("No stored password for {}: {}", self.username, e);
                String::new()
            }
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_valid_settings() {
        let settings = ConnectionSettings::new("http://gemini:8080", "build", None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        let settings = ConnectionSettings::new("", "build", None);
        let result = settings.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("URL cannot be empty"));
    }

    #[test]
    fn test_invalid_url_scheme_rejected() {
        let settings = ConnectionSettings::new("gemini:8080", "build", None);
        let result = settings.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must start with http"));
    }

    #[test]
    fn test_empty_username_rejected() {
        let settings = ConnectionSettings::new("http://gemini:8080", "  ", None);
        let result = settings.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("user name cannot be empty"));
    }

    #[test]
    fn test_debug_masks_password() {
        let settings = ConnectionSettings::new("http://gemini:8080", "build", Some("s3cret"));
        let debug_output = format!("{:?}", settings);
        assert!(!debug_output.contains("s3cret"));
        assert!(debug_output.contains("********"));
    }

    #[test]
    fn test_password_not_serialized_when_absent() {
        let settings = ConnectionSettings::new("http://gemini:8080", "build", None);
        let toml_str = toml::to_string(&settings).unwrap();
        assert!(!toml_str.contains("password"));
    }

    #[test]
    #[serial]
    fn test_env_password_takes_precedence() {
        std::env::set_var(PASSWORD_ENV_VAR, "from-env");
        let settings = ConnectionSettings::new("http://gemini:8080", "build", Some("from-file"));
        let password = settings.resolve_password();
        std::env::remove_var(PASSWORD_ENV_VAR);

        assert_eq!(password, "from-env");
    }

    #[test]
    #[serial]
    fn test_file_password_used_without_env() {
        std::env::remove_var(PASSWORD_ENV_VAR);
        let settings = ConnectionSettings::new("http://gemini:8080", "build", Some("from-file"));
        assert_eq!(settings.resolve_password(), "from-file");
    }
}
