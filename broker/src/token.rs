use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use rp_proto::oauth2::{AccessTokenRequest, AccessTokenResponse};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use crate::upstream::{UpstreamError, APPLICATION_JSON};

/// An issued access token. Immutable once stored - a refresh replaces the
/// whole snapshot, it never mutates one in place.
#[derive(Debug, Clone)]
struct AccessToken {
    secret: String,
    expires_at: Instant,
}

impl AccessToken {
    fn usable_for(&self, margin: Duration) -> bool {
        Instant::now() + margin < self.expires_at
    }
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<AccessToken>,
    /// When the most recent refresh failed, and with what message. Used to
    /// hand the same outcome to callers that were already queued behind
    /// that refresh.
    last_failure: Option<(Instant, String)>,
}

/// Client-credentials token cache shared by every outbound call.
///
/// The whole state sits behind one async mutex which is held across the
/// refresh request itself. That is the single-flight property: while a
/// refresh is in flight every other caller parks on the lock, and on
/// acquiring it finds either the fresh token or the recorded failure of
/// the attempt it was queued behind. Callers arriving after a failure
/// concluded start a new attempt of their own.
pub struct TokenCache {
    client: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: String,
    margin: Duration,
    state: Mutex<TokenState>,
}

impl TokenCache {
    pub fn new(
        client: reqwest::Client,
        token_endpoint: Url,
        client_id: &str,
        client_secret: &str,
        margin: Duration,
    ) -> Self {
        TokenCache {
            client,
            token_endpoint,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            margin,
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Hand out a bearer token with at least the configured margin of
    /// validity left, refreshing first when necessary.
    pub async fn obtain_token(&self) -> Result<String, UpstreamError> {
        let entered = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(token) = state.token.as_ref() {
            if token.usable_for(self.margin) {
                return Ok(token.secret.clone());
            }
        }

        // A refresh that concluded in failure while we were parked on the
        // lock is our outcome too.
        if let Some((failed_at, message)) = state.last_failure.as_ref() {
            if *failed_at >= entered {
                return Err(UpstreamError::TokenRefresh(message.clone()));
            }
        }

        match self.refresh().await {
            Ok(token) => {
                let secret = token.secret.clone();
                state.token = Some(token);
                state.last_failure = None;
                Ok(secret)
            }
            Err(err) => {
                warn!(?err, "unable to get access token");
                state.last_failure = Some((Instant::now(), err.to_string()));
                Err(err)
            }
        }
    }

    async fn refresh(&self) -> Result<AccessToken, UpstreamError> {
        debug!("requesting new client_credentials access token");

        let form = AccessTokenRequest::client_credentials(&self.client_id, &self.client_secret);

        let response = self
            .client
            .post(self.token_endpoint.clone())
            .header(ACCEPT, APPLICATION_JSON)
            .form(&form)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        match response.status() {
            StatusCode::OK => {}
            unexpect => {
                return Err(UpstreamError::Http(
                    unexpect,
                    response.json().await.ok(),
                ))
            }
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(UpstreamError::JsonDecode)?;

        Ok(AccessToken {
            secret: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}
