//! Error types reported to the host.
//!
//! Three failures get their own kind because callers handle them
//! differently: the server cannot be reached at all, a status name does not
//! identify exactly one status, and the web server in front of Gemini
//! rejected an update. Everything else passes through as the underlying
//! [`ApiError`] or [`ConfigError`].

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;

/// The error type returned by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The connection check failed.
    #[error("Gemini service is not available: {message}")]
    ServiceUnavailable {
        /// The underlying failure message.
        message: String,
        /// The underlying failure.
        #[source]
        source: Box<ProviderError>,
    },

    /// The status name matched no status, or more than one.
    #[error("Invalid status: '{0}'")]
    InvalidStatus(String),

    /// The update call came back in a shape that is not a service response.
    #[error("Unable to update issue {field}. The web server may not be configured to allow all Gemini REST verbs.")]
    UpdateRejected {
        /// Which part of the issue was being updated.
        field: &'static str,
        /// The transport failure.
        #[source]
        source: ApiError,
    },

    /// An issue key without a numeric suffix.
    #[error("Invalid issue id '{0}': expected a key like PROJ-42")]
    InvalidIssueId(String),

    /// Any other API failure.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Configuration failures.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl ProviderError {
    /// Wrap any failure of the connection check.
    pub fn service_unavailable(source: ProviderError) -> Self {
        ProviderError::ServiceUnavailable {
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    /// Map an update failure, singling out transport-format errors.
    pub fn from_update(field: &'static str, error: ApiError) -> Self {
        if error.is_transport_format() {
            ProviderError::UpdateRejected {
                field,
                source: error,
            }
        } else {
            ProviderError::Api(error)
        }
    }

    /// Get a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::ServiceUnavailable { message, .. } => {
                format!("Could not reach the Gemini server: {}", message)
            }
            ProviderError::InvalidStatus(name) => {
                format!("'{}' does not name exactly one Gemini status.", name)
            }
            ProviderError::UpdateRejected { .. } => self.to_string(),
            ProviderError::InvalidIssueId(id) => format!("'{}' is not a Gemini issue key.", id),
            ProviderError::Api(e) => match e {
                ApiError::Unauthorized => {
                    "Authentication failed. Please check your user name and password.".to_string()
                }
                ApiError::Forbidden => {
                    "Access denied. You don't have permission to access this resource.".to_string()
                }
                ApiError::NotFound(resource) => format!("'{}' was not found.", resource),
                ApiError::Network(_) => {
                    "Connection failed. Please check the server URL and your network.".to_string()
                }
                ApiError::InvalidUrl(_) => "Invalid Gemini URL in configuration.".to_string(),
                ApiError::Keyring(_) => {
                    "Could not access secure storage. Please run 'gemini configure' again."
                        .to_string()
                }
                _ => e.to_string(),
            },
            ProviderError::Config(e) => match e {
                ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
                ConfigError::ParseError(_) => {
                    "Configuration file is invalid. Please check the file format.".to_string()
                }
                _ => e.to_string(),
            },
        }
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            ProviderError::UpdateRejected { .. } => {
                Some("Allow the PUT and DELETE verbs for the Gemini site in the web server configuration.")
            }
            ProviderError::ServiceUnavailable { .. }
            | ProviderError::Api(ApiError::Network(_)) => {
                Some("Check the server URL with 'gemini configure' and your network connection.")
            }
            ProviderError::Api(ApiError::Unauthorized) => {
                Some("Run 'gemini configure --password-stdin' to update the stored password.")
            }
            ProviderError::Config(ConfigError::ValidationError(_)) => {
                Some("Run 'gemini configure' to fix the connection settings.")
            }
            _ => None,
        }
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
