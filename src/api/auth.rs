//! Authentication handling for the Gemini service.
//!
//! Gemini accepts HTTP Basic credentials (username + password). Passwords can
//! be kept out of the config file by storing them in the OS keyring.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::error::{ApiError, Result};

/// The keyring service name for stored Gemini passwords.
const KEYRING_SERVICE: &str = "gemini-provider";

/// Authentication credentials for Gemini.
#[derive(Clone)]
pub struct Auth {
    /// The Base64-encoded authorization header value.
    auth_header: String,
}

impl Auth {
    /// Create new credentials from a user name and password.
    ///
    /// The password is immediately encoded and not stored in plain text.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            auth_header: build_auth_header(username, password),
        }
    }

    /// Get the authorization header value for HTTP requests.
    pub fn header_value(&self) -> &str {
        &self.auth_header
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The encoded header decodes straight back to the password.
        f.debug_struct("Auth")
            .field("auth_header", &"Basic ********")
            .finish()
    }
}

/// Build the Basic Auth header value.
fn build_auth_header(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = BASE64.encode(credentials.as_bytes());
    format!("Basic {}", encoded)
}

/// Store a password in the OS keyring under the given user name.
///
/// # Errors
///
/// Returns an error if the password cannot be stored in the keyring.
pub fn store_password(username: &str, password: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)
        .map_err(|e| ApiError::Keyring(format!("failed to create keyring entry: {}", e)))?;

    entry
        .set_password(password)
        .map_err(|e| ApiError::Keyring(format!("failed to store password: {}", e)))?;

    Ok(())
}

/// Retrieve a password from the OS keyring.
///
/// # Errors
///
/// Returns an error if no password is stored or the keyring is unavailable.
pub fn get_password(username: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .get_password()
        .map_err(|e| ApiError::Keyring(format!("failed to retrieve password: {}", e)))
}
