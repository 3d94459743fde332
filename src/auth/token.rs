//! Persisted OAuth token and client-secret file formats.

use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Tokens this close to expiry (in seconds) are treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client registration as downloaded from the Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The file wraps the registration in an `installed` or `web` section.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Read the client-secrets file.
    ///
    /// # Errors
    ///
    /// `AuthError::MissingCredentialsFile` if the file does not exist,
    /// `AuthError::InvalidCredentialsFile` if it cannot be read or has no
    /// `installed`/`web` section.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::MissingCredentialsFile {
                path: path.to_path_buf(),
            });
        }

        let invalid = |reason: String| AuthError::InvalidCredentialsFile {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let file: ClientSecretsFile =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        file.installed
            .or(file.web)
            .ok_or_else(|| invalid("expected an \"installed\" or \"web\" section".to_string()))
    }
}

/// Token endpoint reply for both code exchange and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Expiry `secs` from now. A lifetime too large to represent is treated as
/// already expired so the next run refreshes.
fn expiry_after(secs: i64) -> DateTime<Utc> {
    let now = Utc::now();
    ChronoDuration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| {
            log::warn!("Token endpoint returned an unusable expires_in of {}", secs);
            now
        })
}

/// Token record kept in the token cache file.
///
/// Carries the client registration so a refresh does not need the
/// client-secrets file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredToken {
    /// Build a record from a token endpoint reply.
    ///
    /// Refresh replies usually omit the refresh token; `previous_refresh`
    /// keeps the one already held.
    pub fn from_response(
        response: TokenResponse,
        token_uri: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &[String],
        previous_refresh: Option<String>,
    ) -> Self {
        let scopes = match response.scope {
            Some(ref granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(str::to_string).collect()
            }
            _ => scopes.to_vec(),
        };

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expiry: response.expires_in.map(expiry_after),
            token_uri: token_uri.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes,
        }
    }

    /// Whether the token has expired as of `now`, allowing for [`EXPIRY_SKEW_SECS`].
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) >= expiry,
            None => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(Utc::now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Load the token cache file.
    ///
    /// A missing file is `None`. An unreadable or corrupt file is logged and
    /// also treated as `None` so the caller falls back to a fresh grant.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read token file '{}': {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("Ignoring corrupt token file '{}': {}", path.display(), e);
                None
            }
        }
    }

    /// Write the token cache file, replacing any previous content.
    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| AuthError::IoError(std::io::Error::other(e)))?;

        write_private(path, &json)?;
        log::debug!("Saved Drive token to {}", path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)?;
    file.flush()
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

/// POST a form to a token endpoint and decode the reply.
///
/// The error string carries the status and body for the caller to wrap.
pub(crate) async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, String> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(format!("token endpoint returned {}: {}", status, body));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| format!("malformed token response: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: Option<DateTime<Utc>>, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: "access".to_string(),
            refresh_token: refresh.map(str::to_string),
            expiry,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![],
        }
    }

    #[test]
    fn test_token_within_skew_is_expired() {
        let now = Utc::now();
        let t = token(Some(now + ChronoDuration::seconds(30)), None);
        assert!(t.is_expired_at(now));
        let t = token(Some(now + ChronoDuration::seconds(600)), None);
        assert!(!t.is_expired_at(now));
    }

    #[test]
    fn test_huge_expires_in_is_treated_as_expired() {
        for secs in [i64::MAX, i64::MIN] {
            let response = TokenResponse {
                access_token: "access".to_string(),
                expires_in: Some(secs),
                refresh_token: Some("refresh".to_string()),
                scope: None,
            };
            let t = StoredToken::from_response(response, DEFAULT_TOKEN_URI, "id", "secret", &[], None);
            assert!(t.expiry.is_some());
            assert!(!t.is_valid());
            assert!(t.can_refresh());
        }
    }

    #[test]
    fn test_token_without_expiry_is_valid() {
        assert!(token(None, None).is_valid());
    }

    #[test]
    fn test_can_refresh_requires_non_empty_refresh_token() {
        assert!(!token(None, None).can_refresh());
        assert!(!token(None, Some("")).can_refresh());
        assert!(token(None, Some("r")).can_refresh());
    }

    #[test]
    fn test_from_response_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "new".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            scope: None,
        };
        let scopes = vec!["scope-a".to_string()];
        let t = StoredToken::from_response(
            response,
            DEFAULT_TOKEN_URI,
            "id",
            "secret",
            &scopes,
            Some("old-refresh".to_string()),
        );
        assert_eq!(t.access_token, "new");
        assert_eq!(t.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(t.scopes, scopes);
        assert!(t.is_valid());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let t = token(None, Some("r"));
        t.save(&path).unwrap();
        assert_eq!(StoredToken::load(&path), Some(t));
    }

    #[test]
    fn test_corrupt_token_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"\x80\x04\x95garbage").unwrap();
        assert_eq!(StoredToken::load(&path), None);
    }

    #[test]
    fn test_client_secrets_installed_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"cid","client_secret":"cs","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        let secrets = ClientSecrets::load(&path).unwrap();
        assert_eq!(secrets.client_id, "cid");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_client_secrets_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ClientSecrets::load(&dir.path().join("credentials.json"));
        assert!(matches!(result, Err(AuthError::MissingCredentialsFile { .. })));
    }

    #[test]
    fn test_client_secrets_without_section_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"other":{}}"#).unwrap();
        let result = ClientSecrets::load(&path);
        assert!(matches!(result, Err(AuthError::InvalidCredentialsFile { .. })));
    }
}
