//! API error types for the Gemini client.

use thiserror::Error;

/// Errors that can occur when talking to the Gemini service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed - invalid username or password.
    #[error("Authentication failed: check your username and password")]
    Unauthorized,

    /// Permission denied - user lacks access to the resource.
    #[error("Permission denied: you don't have access to this resource")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The web server refused the HTTP verb.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Gemini server error.
    #[error("Gemini server error: {0}")]
    ServerError(String),

    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Keyring error when storing/retrieving passwords.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Invalid response from the service.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from an HTTP status code.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound(context.to_string()),
            405 | 501 => ApiError::MethodNotAllowed(format!("HTTP {}: {}", status, context)),
            500..=599 => ApiError::ServerError(format!("HTTP {}: {}", status, context)),
            _ => ApiError::ServerError(format!("Unexpected HTTP {}: {}", status, context)),
        }
    }

    /// Whether the server answered with something other than a service response.
    ///
    /// This is what a web server in front of Gemini produces when it blocks
    /// the PUT verb: an HTML error page or a bare 405.
    pub fn is_transport_format(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidResponse(_) | ApiError::MethodNotAllowed(_)
        )
    }
}
