use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::form;
use crate::properties::{AuthFlow, ConnectionProperties};

const AUTHORIZATION: &str = "Authorization";

/// Refresh fires at roughly 80% of the token lifetime, never sooner than this.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(5);
/// Backoff between attempts after a failed refresh.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Parameters for one `client_credentials` exchange against the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub token_uri: Url,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds; absent means the token is treated as non-expiring.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Transport used exclusively for token exchange and refresh, separate from
/// whatever client talks to the catalog service itself.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenGrant>;
}

/// [`TokenTransport`] over a dedicated `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTokenTransport {
    http: reqwest::Client,
}

impl ReqwestTokenTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenTransport for ReqwestTokenTransport {
    async fn exchange(&self, request: &TokenRequest) -> Result<TokenGrant> {
        let mut params = vec![
            ("grant_type", "client_credentials"),
            ("client_id", request.client_id.as_str()),
            ("client_secret", request.client_secret.as_str()),
        ];
        if let Some(scope) = request.scope.as_deref() {
            params.push(("scope", scope));
        }

        let response = self
            .http
            .post(request.token_uri.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form::encode(params))
            .send()
            .await
            .context("failed to call token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".into());
            bail!("token endpoint returned {status}: {body}");
        }

        response
            .json::<TokenGrant>()
            .await
            .context("invalid token endpoint response body")
    }
}

/// A live set of bearer headers for one backend identity.
///
/// Opened once per endpoint at startup and closed exactly once at shutdown.
/// Under the client-credentials flow the session re-exchanges on its own
/// background task before the token expires; a failed refresh is logged and
/// the session keeps serving its last-known-good headers until the next
/// attempt (stale-but-valid beats none). Callers always observe a complete
/// header set: refresh swaps the whole map, never individual entries.
#[derive(Debug)]
pub struct CredentialSession {
    headers: Arc<RwLock<HashMap<String, String>>>,
    refresh: Mutex<Option<JoinHandle<()>>>,
    session_id: Uuid,
}

impl CredentialSession {
    /// Opens a session using the flow the properties select.
    ///
    /// Fatal on missing credentials or a failed initial exchange; nothing is
    /// retried here.
    pub async fn open(properties: &ConnectionProperties) -> Result<Self, AuthError> {
        let transport = Arc::new(ReqwestTokenTransport::new(reqwest::Client::new()));
        Self::open_with_transport(transport, properties).await
    }

    pub async fn open_with_transport(
        transport: Arc<dyn TokenTransport>,
        properties: &ConnectionProperties,
    ) -> Result<Self, AuthError> {
        let session_id = Uuid::new_v4();

        match properties.auth_flow()? {
            AuthFlow::StaticToken(token) => {
                debug!(session = %session_id, "using static bearer token, no refresh scheduled");
                Ok(Self {
                    headers: Arc::new(RwLock::new(bearer_headers(&token))),
                    refresh: Mutex::new(None),
                    session_id,
                })
            }
            AuthFlow::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let token_uri = properties
                    .oauth2_server_uri()
                    .ok_or(AuthError::MissingTokenEndpoint)?;
                let token_uri = Url::parse(token_uri).map_err(AuthError::InvalidTokenEndpoint)?;
                let request = TokenRequest {
                    token_uri,
                    client_id,
                    client_secret,
                    scope: properties.scope().map(str::to_string),
                };

                let grant = transport
                    .exchange(&request)
                    .await
                    .map_err(AuthError::Exchange)?;
                let headers = Arc::new(RwLock::new(bearer_headers(&grant.access_token)));

                let refresh = grant.expires_in.map(|expires_in| {
                    spawn_refresh(
                        Arc::clone(&transport),
                        request,
                        Arc::clone(&headers),
                        session_id,
                        expires_in,
                    )
                });
                debug!(
                    session = %session_id,
                    refresh = refresh.is_some(),
                    "opened client-credentials session"
                );

                Ok(Self {
                    headers,
                    refresh: Mutex::new(refresh),
                    session_id,
                })
            }
        }
    }

    /// Returns the latest complete header snapshot.
    ///
    /// Safe to call concurrently with an in-flight refresh.
    pub fn headers(&self) -> HashMap<String, String> {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Cancels the background refresh task. Idempotent; also runs on drop so
    /// the task never outlives the session or blocks process shutdown.
    pub fn close(&self) {
        let handle = self
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!(session = %self.session_id, "credential session closed");
        }
    }
}

impl Drop for CredentialSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn bearer_headers(token: &str) -> HashMap<String, String> {
    HashMap::from([(AUTHORIZATION.to_string(), format!("Bearer {token}"))])
}

fn refresh_delay(expires_in: u64) -> Duration {
    Duration::from_secs(expires_in.saturating_mul(4) / 5).max(MIN_REFRESH_DELAY)
}

/// Owns the autonomous refresh schedule for one session. Each session gets
/// its own task, so sessions never contend on a shared timer.
fn spawn_refresh(
    transport: Arc<dyn TokenTransport>,
    request: TokenRequest,
    headers: Arc<RwLock<HashMap<String, String>>>,
    session_id: Uuid,
    expires_in: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay = refresh_delay(expires_in);
        loop {
            tokio::time::sleep(delay).await;
            match transport.exchange(&request).await {
                Ok(grant) => {
                    let fresh = bearer_headers(&grant.access_token);
                    *headers.write().unwrap_or_else(PoisonError::into_inner) = fresh;
                    debug!(session = %session_id, "refreshed bearer credentials");
                    match grant.expires_in {
                        Some(expires_in) => delay = refresh_delay(expires_in),
                        None => {
                            debug!(
                                session = %session_id,
                                "refreshed token has no expiry, stopping refresh schedule"
                            );
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        session = %session_id,
                        error = %err,
                        "token refresh failed, keeping last-known-good credentials"
                    );
                    delay = REFRESH_RETRY_DELAY;
                }
            }
        }
    })
}
