//! CredentialStore - produces a Drive session from cached or fresh credentials.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::flow::ConsentFlow;
use super::token::{request_token, ClientSecrets, StoredToken};
use super::{AuthError, Session};
use crate::config::Config;

/// Timeout for token endpoint requests.
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection timeout for token endpoint requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type UrlHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Loads, refreshes and persists the Drive OAuth token.
pub struct CredentialStore {
    token_path: PathBuf,
    credentials_path: PathBuf,
    scopes: Vec<String>,
    consent_timeout: Duration,
    http_client: reqwest::Client,
    on_consent_url: UrlHandler,
}

fn print_consent_url(url: &str) {
    println!("Please visit this URL to authorize Google Drive access:");
    println!();
    println!("    {}", url);
    println!();
}

impl CredentialStore {
    /// Create a store from the configured paths, scopes and consent timeout.
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        Self::with_paths(
            config.token_path.clone(),
            config.credentials_path.clone(),
            config.drive_scopes.clone(),
            config.timeouts.consent(),
        )
    }

    pub fn with_paths(
        token_path: PathBuf,
        credentials_path: PathBuf,
        scopes: Vec<String>,
        consent_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            token_path,
            credentials_path,
            scopes,
            consent_timeout,
            http_client,
            on_consent_url: Arc::new(print_consent_url),
        })
    }

    /// Replace how the consent URL is presented to the operator.
    pub fn with_consent_handler(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_consent_url = Arc::new(handler);
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Produce a session for this run.
    ///
    /// Uses the cached token when still valid, refreshes it when expired,
    /// and otherwise runs the consent flow. A refreshed or newly granted
    /// token replaces the cache file.
    ///
    /// # Errors
    ///
    /// `AuthError::MissingCredentialsFile` when a fresh grant is needed and
    /// the client-secrets file does not exist; any consent-flow error.
    pub async fn acquire_session(&self) -> Result<Session, AuthError> {
        if let Some(token) = StoredToken::load(&self.token_path) {
            if token.is_valid() {
                log::info!("Using cached Drive token from {}", self.token_path.display());
                return Ok(Session::new(token.access_token));
            }

            if token.can_refresh() {
                match self.refresh(&token).await {
                    Ok(refreshed) => {
                        refreshed.save(&self.token_path)?;
                        log::info!("Refreshed Drive token");
                        return Ok(Session::new(refreshed.access_token));
                    }
                    Err(e) => {
                        println!(
                            "{}. Deleting '{}' for re-auth.",
                            e,
                            self.token_path.display()
                        );
                        self.discard_token()?;
                    }
                }
            } else {
                log::info!("Cached Drive token expired and cannot be refreshed");
            }
        }

        let token = self.grant().await?;
        token.save(&self.token_path)?;
        Ok(Session::new(token.access_token))
    }

    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = token.refresh_token.clone().unwrap_or_default();
        let form = [
            ("client_id", token.client_id.as_str()),
            ("client_secret", token.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = request_token(&self.http_client, &token.token_uri, &form)
            .await
            .map_err(AuthError::Refresh)?;

        Ok(StoredToken::from_response(
            response,
            &token.token_uri,
            &token.client_id,
            &token.client_secret,
            &token.scopes,
            token.refresh_token.clone(),
        ))
    }

    async fn grant(&self) -> Result<StoredToken, AuthError> {
        let secrets = ClientSecrets::load(&self.credentials_path)?;
        let flow = ConsentFlow {
            secrets: &secrets,
            scopes: &self.scopes,
            timeout: self.consent_timeout,
            http: &self.http_client,
            on_url: self.on_consent_url.as_ref(),
        };

        let response = flow.run().await?;
        Ok(StoredToken::from_response(
            response,
            &secrets.token_uri,
            &secrets.client_id,
            &secrets.client_secret,
            &self.scopes,
            None,
        ))
    }

    fn discard_token(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.token_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
