//! Access tokens for the Google Drive API.
//!
//! Two sources are supported:
//! - [`InstalledAppAuthenticator`]: user credentials kept in a [`TokenStore`],
//!   refreshed when expired and obtained through a browser consent flow on
//!   first run.
//! - [`ServiceAccountAuthenticator`]: JWT bearer grant with a service account key.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info};
use url::Url;

use crate::error::{DriveError, Result};
use crate::models::{
    default_token_uri, ClientSecretDetail, ClientSecrets, ServiceAccountCredentials, StoredToken,
    TokenResponse,
};
use crate::token_store::TokenStore;

/// Read-only Google Drive scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Anything that can hand out a bearer token for Drive requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn access_token(&self) -> Result<String> {
        (**self).access_token().await
    }
}

/// Authenticator for end-user credentials (installed application flow).
pub struct InstalledAppAuthenticator<S: TokenStore> {
    store: S,
    client_secret_path: PathBuf,
    client: Client,
    cached_token: RwLock<Option<StoredToken>>,
}

impl<S: TokenStore> InstalledAppAuthenticator<S> {
    /// `client_secret_path` is only read when no usable stored token exists.
    pub fn new<P: Into<PathBuf>>(store: S, client_secret_path: P) -> Self {
        Self {
            store,
            client_secret_path: client_secret_path.into(),
            client: Client::new(),
            cached_token: RwLock::new(None),
        }
    }

    async fn current_token(&self) -> Result<StoredToken> {
        let stored = match self.cached_token.read().await.clone() {
            Some(token) => Some(token),
            None => self.store.load()?,
        };

        match stored {
            Some(token) if token.is_valid() => Ok(token),
            Some(token) if token.refresh_token.is_some() => {
                info!("Stored token expired, refreshing");
                let refreshed = self.refresh(&token).await?;
                self.store.save(&refreshed)?;
                Ok(refreshed)
            }
            _ => {
                let token = self.run_consent_flow().await?;
                self.store.save(&token)?;
                Ok(token)
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| DriveError::TokenRefreshError("no refresh token".to_string()))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", token.client_id.as_str()),
            ("client_secret", token.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = request_token(&self.client, &token.token_uri, &params)
            .await
            .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

        let mut refreshed = StoredToken::from_response(
            response,
            &token.client_id,
            &token.client_secret,
            &token.token_uri,
        )?;
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = token.refresh_token.clone();
        }
        if refreshed.scopes.is_empty() {
            refreshed.scopes = token.scopes.clone();
        }
        Ok(refreshed)
    }

    /// Ask the user to grant access in a browser and catch the redirect locally.
    async fn run_consent_flow(&self) -> Result<StoredToken> {
        let secrets = read_client_secrets(&self.client_secret_path)?;

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = random_state();

        let auth_url = authorization_url(&secrets, &redirect_uri, &state)?;
        println!("Please visit this URL to authorize this application: {}", auth_url);

        let code = wait_for_redirect(listener, state).await?;
        debug!("received authorization code");

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code", code.as_str()),
        ];
        let response = request_token(&self.client, &secrets.token_uri, &params).await?;

        StoredToken::from_response(
            response,
            &secrets.client_id,
            &secrets.client_secret,
            &secrets.token_uri,
        )
    }
}

#[async_trait]
impl<S: TokenStore> TokenSource for InstalledAppAuthenticator<S> {
    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_valid() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let token = self.current_token().await?;
        let access_token = token.access_token.clone();

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(token);
        }

        Ok(access_token)
    }
}

impl StoredToken {
    fn from_response(
        response: TokenResponse,
        client_id: &str,
        client_secret: &str,
        token_uri: &str,
    ) -> Result<Self> {
        let scopes = response
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: expiry_from_now(response.expires_in)?,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_uri: token_uri.to_string(),
            scopes,
        })
    }
}

/// Absolute expiry for a token endpoint's `expires_in`.
fn expiry_from_now(expires_in: u64) -> Result<DateTime<Utc>> {
    i64::try_from(expires_in)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            DriveError::AuthenticationError(format!("invalid expires_in: {}", expires_in))
        })
}

fn read_client_secrets(path: &Path) -> Result<ClientSecretDetail> {
    let content = fs::read_to_string(path)?;
    let secrets: ClientSecrets = serde_json::from_str(&content)?;
    Ok(secrets.installed)
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// Build the URL the user opens to grant access.
fn authorization_url(secrets: &ClientSecretDetail, redirect_uri: &str, state: &str) -> Result<Url> {
    Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| DriveError::ConsentFlowError(format!("invalid auth_uri: {}", e)))
}

const SUCCESS_PAGE: &str =
    "The authentication flow has completed. You may close this window.";
const FAILURE_PAGE: &str = "The authentication flow failed. Check the terminal for details.";

/// Query parameters Google appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

struct CallbackState {
    expected_state: String,
    result_tx: Mutex<Option<oneshot::Sender<Result<String>>>>,
}

/// Serve the loopback redirect URI until the authorization code arrives.
async fn wait_for_redirect(listener: TcpListener, expected_state: String) -> Result<String> {
    let (result_tx, result_rx) = oneshot::channel::<Result<String>>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let callback = Arc::new(CallbackState {
        expected_state,
        result_tx: Mutex::new(Some(result_tx)),
    });
    let app = Router::new()
        .route("/", get(redirect_callback))
        .with_state(callback);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = result_rx.await.unwrap_or_else(|_| {
        Err(DriveError::ConsentFlowError(
            "redirect server stopped before a code arrived".to_string(),
        ))
    });

    let _ = shutdown_tx.send(());
    // Idle browser connections must not hold the flow open.
    if tokio::time::timeout(std::time::Duration::from_secs(2), server)
        .await
        .is_err()
    {
        debug!("redirect server still draining connections");
    }

    outcome
}

async fn redirect_callback(
    State(callback): State<Arc<CallbackState>>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, &'static str) {
    let result = match check_redirect(params, &callback.expected_state) {
        Ok(None) => return (StatusCode::NOT_FOUND, ""),
        Ok(Some(code)) => Ok(code),
        Err(e) => Err(e),
    };

    let reply = if result.is_ok() {
        (StatusCode::OK, SUCCESS_PAGE)
    } else {
        (StatusCode::BAD_REQUEST, FAILURE_PAGE)
    };

    if let Some(tx) = callback.result_tx.lock().await.take() {
        let _ = tx.send(result);
    }
    reply
}

/// Validate a redirect and pull out the authorization code.
///
/// Returns `Ok(None)` when the request carries neither a code nor an error.
fn check_redirect(params: RedirectParams, expected_state: &str) -> Result<Option<String>> {
    if let Some(error) = params.error {
        return Err(DriveError::ConsentFlowError(error));
    }
    let Some(code) = params.code else {
        return Ok(None);
    };
    if params.state.as_deref() != Some(expected_state) {
        return Err(DriveError::ConsentFlowError("state mismatch".to_string()));
    }
    Ok(Some(code))
}

/// POST a form to a token endpoint and decode the token response.
async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = client.post(token_uri).form(params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::AuthenticationError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    Ok(response.json().await?)
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: i64,      // Expiration time
    iat: i64,      // Issued at
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: chrono::DateTime<Utc>,
}

/// Authenticator for Google APIs using service account credentials.
pub struct ServiceAccountAuthenticator {
    credentials: ServiceAccountCredentials,
    client: Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuthenticator {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            credentials,
            client: Client::new(),
            cached_token: RwLock::new(None),
        }
    }

    fn token_uri(&self) -> String {
        self.credentials
            .token_uri
            .clone()
            .unwrap_or_else(default_token_uri)
    }

    /// Assertion claims; the audience is the account's own token endpoint.
    fn claims(&self, now: i64) -> Claims {
        Claims {
            iss: self.credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: self.token_uri(),
            iat: now,
            exp: now + 3600,
        }
    }

    /// Fetch a new access token using a signed JWT assertion.
    async fn fetch_token(&self) -> Result<CachedToken> {
        let claims = self.claims(Utc::now().timestamp());
        let token_uri = claims.aud.clone();

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        let response = request_token(&self.client, &token_uri, &params)
            .await
            .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

        Ok(CachedToken {
            access_token: response.access_token,
            expires_at: expiry_from_now(response.expires_in)?,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuthenticator {
    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() + Duration::seconds(60) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.fetch_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }
}
