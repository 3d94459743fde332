//! Installed-app consent flow over a loopback redirect.

use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

use super::token::{request_token, ClientSecrets, TokenResponse};
use super::AuthError;

/// Largest request head read from the browser.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h3>Authorization failed.</h3>\
    <p>Return to the terminal for details.</p></body></html>";

/// Query parameters carried by a redirect to the loopback listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackParams {
    Code { code: String, state: Option<String> },
    Error(String),
    /// Not a redirect (e.g. a favicon request).
    Unrelated,
}

/// Parse the request line of a redirect, e.g. `GET /?code=x&state=y HTTP/1.1`.
pub fn parse_callback(request_line: &str) -> CallbackParams {
    let mut parts = request_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return CallbackParams::Unrelated;
    };

    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return CallbackParams::Unrelated;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    match (code, error) {
        (_, Some(error)) => CallbackParams::Error(error),
        (Some(code), None) => CallbackParams::Code { code, state },
        (None, None) => CallbackParams::Unrelated,
    }
}

/// Consent URL the operator opens in a browser.
pub fn authorization_url(
    secrets: &ClientSecrets,
    scopes: &[String],
    redirect_uri: &str,
    state: &str,
) -> Result<Url, AuthError> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| AuthError::Grant(format!("invalid auth_uri '{}': {}", secrets.auth_uri, e)))
}

/// Random value tying the redirect to this run.
fn new_state() -> String {
    Uuid::new_v4().simple().to_string()
}

/// One run of the consent flow.
pub struct ConsentFlow<'a> {
    pub secrets: &'a ClientSecrets,
    pub scopes: &'a [String],
    pub timeout: Duration,
    pub http: &'a reqwest::Client,
    /// Receives the consent URL; prints it by default.
    pub on_url: &'a (dyn Fn(&str) + Send + Sync),
}

impl ConsentFlow<'_> {
    /// Run the flow and exchange the returned code for a token.
    ///
    /// # Errors
    ///
    /// `AuthError::ConsentTimeout` if no redirect arrives within the timeout,
    /// `AuthError::ConsentDenied` if the redirect carries an error,
    /// `AuthError::StateMismatch` if its state differs from the request,
    /// `AuthError::Grant` if the code exchange fails.
    pub async fn run(&self) -> Result<TokenResponse, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = new_state();

        let url = authorization_url(self.secrets, self.scopes, &redirect_uri, &state)?;
        (self.on_url)(url.as_str());
        log::info!("Waiting up to {:?} for consent on port {}", self.timeout, port);

        let code = tokio::time::timeout(self.timeout, wait_for_code(&listener, &state))
            .await
            .map_err(|_| AuthError::ConsentTimeout {
                secs: self.timeout.as_secs(),
            })??;

        let form = [
            ("code", code.as_str()),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        request_token(self.http, &self.secrets.token_uri, &form)
            .await
            .map_err(AuthError::Grant)
    }
}

/// Accept connections until one carries the redirect.
async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        log::debug!("Consent callback connection from {}", peer);

        let request_line = read_request_line(&mut stream).await?;
        match parse_callback(&request_line) {
            CallbackParams::Unrelated => {
                respond(&mut stream, "404 Not Found", "").await;
            }
            CallbackParams::Error(error) => {
                respond(&mut stream, "200 OK", FAILURE_PAGE).await;
                return Err(AuthError::ConsentDenied(error));
            }
            CallbackParams::Code { code, state } => {
                if state.as_deref() != Some(expected_state) {
                    respond(&mut stream, "400 Bad Request", FAILURE_PAGE).await;
                    return Err(AuthError::StateMismatch);
                }
                respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                return Ok(code);
            }
        }
    }
}

async fn read_request_line(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") && buf.len() < MAX_REQUEST_BYTES {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    Ok(head.lines().next().unwrap_or_default().to_string())
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    // The browser going away must not fail the flow.
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        log::debug!("Failed to answer consent callback: {}", e);
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "cid".to_string(),
            client_secret: "cs".to_string(),
            auth_uri: "https://accounts.example.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.example.com/token".to_string(),
        }
    }

    #[test]
    fn test_parse_callback_code_and_state() {
        assert_eq!(
            parse_callback("GET /?code=4%2Fabc&state=xyz&scope=drive HTTP/1.1"),
            CallbackParams::Code {
                code: "4/abc".to_string(),
                state: Some("xyz".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_callback_error() {
        assert_eq!(
            parse_callback("GET /?error=access_denied&state=xyz HTTP/1.1"),
            CallbackParams::Error("access_denied".to_string())
        );
    }

    #[test]
    fn test_parse_callback_unrelated_requests() {
        assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1"), CallbackParams::Unrelated);
        assert_eq!(parse_callback("POST /?code=x HTTP/1.1"), CallbackParams::Unrelated);
        assert_eq!(parse_callback(""), CallbackParams::Unrelated);
    }

    #[test]
    fn test_authorization_url_carries_scopes_and_offline_access() {
        let scopes = vec![
            "https://www.googleapis.com/auth/drive".to_string(),
            "openid".to_string(),
        ];
        let url = authorization_url(&secrets(), &scopes, "http://127.0.0.1:8080/", "st").unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8080/");
        assert_eq!(pairs["scope"], "https://www.googleapis.com/auth/drive openid");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["state"], "st");
    }

    #[test]
    fn test_new_state_is_hex() {
        let state = new_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(state, new_state());
    }
}
