//! Google Drive authorization.
//!
//! The [`CredentialStore`] turns an on-disk token cache plus an
//! operator-provided OAuth client file into a [`Session`] usable for one
//! upload. Expired tokens are refreshed in place; when no usable token exists
//! the installed-app consent flow runs against a loopback listener.

use std::fmt;
use std::path::PathBuf;

mod flow;
mod store;
mod token;

pub use flow::{authorization_url, parse_callback, CallbackParams, ConsentFlow};
pub use store::CredentialStore;
pub use token::{ClientSecrets, StoredToken, TokenResponse, EXPIRY_SKEW_SECS};

/// Authorization for Drive requests, valid for the current run.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// Never print the token itself.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Errors that can occur while acquiring a Drive session.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(
        "Google Drive API credentials file '{}' not found. Download an OAuth client \
         (Desktop app) from your Google Cloud Console project and place it there",
        path.display()
    )]
    MissingCredentialsFile { path: PathBuf },

    #[error("Invalid credentials file '{}': {reason}", path.display())]
    InvalidCredentialsFile { path: PathBuf, reason: String },

    #[error("Failed to refresh Drive token: {0}")]
    Refresh(String),

    #[error("Authorization grant failed: {0}")]
    Grant(String),

    #[error("Timed out after {secs}s waiting for browser consent")]
    ConsentTimeout { secs: u64 },

    #[error("Consent was denied: {0}")]
    ConsentDenied(String),

    #[error("Authorization callback state did not match the request")]
    StateMismatch,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session::new("ya29.secret");
        let debug = format!("{:?}", session);
        assert!(!debug.contains("ya29.secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_session_bearer_header() {
        assert_eq!(Session::new("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn test_missing_credentials_display_names_path() {
        let err = AuthError::MissingCredentialsFile {
            path: PathBuf::from("credentials.json"),
        };
        assert!(err.to_string().contains("'credentials.json' not found"));
    }
}
