use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use rp_proto::scim_v1::{ScimListResponse, ScimPatchOp};
use rp_proto::v1::{AssertionResultResponse, PasswordVerifyRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{BrokerConfig, PasswordKickoff};
use crate::token::TokenCache;

pub const APPLICATION_JSON: &str = "application/json";

/// Outcome classification for one outbound call. `Transport` is the
/// network-level failure class (DNS, connect, timeout); `Http` means the
/// upstream was reachable but answered with a non-success status, with
/// whatever structured error envelope it supplied.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("transport failure: {0}")]
    Transport(reqwest::Error),
    #[error("upstream returned http status {0}")]
    Http(StatusCode, Option<UpstreamErrorBody>),
    #[error("unable to decode upstream response: {0}")]
    JsonDecode(reqwest::Error),
    /// Outcome of a token refresh this caller was queued behind.
    #[error("{0}")]
    TokenRefresh(String),
}

impl UpstreamError {
    /// The provider-supplied error message, when the upstream answered
    /// with a parseable error envelope. This is what the façade forwards
    /// to the caller for user-actionable rejections.
    pub fn structured_message(&self) -> Option<&str> {
        match self {
            UpstreamError::Http(_, Some(body)) => body.detail(),
            _ => None,
        }
    }
}

/// The provider's error envelope. Its services disagree on the field
/// name, so both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

impl UpstreamErrorBody {
    pub fn detail(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error_message.as_deref())
    }
}

/// Result of a password verification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordVerdict {
    Accepted,
    /// The provider rejected the credentials and said why. The message is
    /// considered user-actionable and may be forwarded.
    Rejected(String),
}

/// Executes the authenticated JSON calls against the identity provider.
/// One reqwest client (bounded timeout) shared with the token cache.
pub(crate) struct UpstreamClient {
    client: reqwest::Client,
    tokens: TokenCache,
    config: BrokerConfig,
}

fn user_agent() -> &'static str {
    static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
    APP_USER_AGENT
}

impl UpstreamClient {
    pub(crate) fn new(config: BrokerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent())
            .timeout(config.request_timeout())
            .build()?;

        let tokens = TokenCache::new(
            client.clone(),
            config.token_endpoint.clone(),
            &config.client_id,
            &config.client_secret,
            config.token_margin(),
        );

        Ok(UpstreamClient {
            client,
            tokens,
            config,
        })
    }

    pub(crate) fn config(&self) -> &BrokerConfig {
        &self.config
    }

    async fn classify<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, UpstreamError> {
        match response.status() {
            StatusCode::OK => {}
            unexpect => {
                return Err(UpstreamError::Http(
                    unexpect,
                    response.json().await.ok(),
                ))
            }
        }

        response.json().await.map_err(UpstreamError::JsonDecode)
    }

    async fn perform_auth_post<R: Serialize + ?Sized>(
        &self,
        url: String,
        body: &R,
    ) -> Result<reqwest::Response, UpstreamError> {
        let token = self.tokens.obtain_token().await?;

        self.client
            .post(url.as_str())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .header(ACCEPT, APPLICATION_JSON)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(UpstreamError::Transport)
    }

    /// Verify a username/password against the authentication policy
    /// service. This is the one upstream call that discriminates on status
    /// codes (204 accept, 200 with a message reject) and the one that
    /// carries no bearer token.
    pub(crate) async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<PasswordVerdict, UpstreamError> {
        let (url, policy_id) = match self.config.password_kickoff {
            PasswordKickoff::PolicyBody => (
                self.config.authsvc_endpoint.to_string(),
                Some(self.config.password_policy_id.clone()),
            ),
            PasswordKickoff::PolicyPath => (
                format!("{}/policy/password", self.config.authsvc_endpoint),
                None,
            ),
        };

        let body = PasswordVerifyRequest {
            policy_id,
            operation: "verify".to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };

        debug!(%username, "verifying password with authentication service");

        let response = self
            .client
            .post(url.as_str())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .header(ACCEPT, APPLICATION_JSON)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(PasswordVerdict::Accepted),
            StatusCode::OK => {
                let body: UpstreamErrorBody =
                    response.json().await.map_err(UpstreamError::JsonDecode)?;
                match body.detail() {
                    Some(message) => Ok(PasswordVerdict::Rejected(message.to_string())),
                    // 200 without a message is not a verdict we can use
                    None => Err(UpstreamError::Http(StatusCode::OK, Some(body))),
                }
            }
            unexpect => Err(UpstreamError::Http(
                unexpect,
                response.json().await.ok(),
            )),
        }
    }

    /// Forward a ceremony body verbatim to the FIDO2 service and return
    /// its response verbatim.
    pub(crate) async fn fido2_post(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.config.fido2_endpoint, path);
        debug!(%path, "proxying ceremony request to FIDO2 service");
        let response = self.perform_auth_post(url, body).await?;
        self.classify(response).await
    }

    /// The assertion-result call used to complete a FIDO2 login, parsed
    /// into its known shape rather than passed through.
    pub(crate) async fn fido2_assertion_result(
        &self,
        body: &Value,
    ) -> Result<AssertionResultResponse, UpstreamError> {
        let url = format!("{}/assertion/result", self.config.fido2_endpoint);
        debug!("submitting assertion result to FIDO2 service");
        let response = self.perform_auth_post(url, body).await?;
        self.classify(response).await
    }

    pub(crate) async fn scim_search_user(
        &self,
        username: &str,
    ) -> Result<ScimListResponse, UpstreamError> {
        let url = format!("{}/Users", self.config.scim_endpoint);
        let token = self.tokens.obtain_token().await?;

        debug!(%username, "searching SCIM directory");

        let response = self
            .client
            .get(url.as_str())
            .query(&[("filter", format!("username eq {}", username).as_str())])
            .header(ACCEPT, APPLICATION_JSON)
            .bearer_auth(token)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        self.classify(response).await
    }

    /// Remove one FIDO2 registration from a user record. The provider's
    /// remove is idempotent - patching out an id that is already gone
    /// still answers 200 with the current record.
    pub(crate) async fn scim_remove_credential(
        &self,
        scim_id: &str,
        credential_id: &str,
    ) -> Result<ScimListResponse, UpstreamError> {
        let url = format!("{}/Users/{}", self.config.scim_endpoint, scim_id);
        let path = format!(
            "{}:fido2registrations[credentialId eq {}]",
            self.config.fido2_extension_urn, credential_id
        );
        let body = ScimPatchOp::remove(path);
        let token = self.tokens.obtain_token().await?;

        debug!(%scim_id, %credential_id, "removing FIDO2 registration via SCIM patch");

        let response = self
            .client
            .patch(url.as_str())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .header(ACCEPT, APPLICATION_JSON)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        self.classify(response).await
    }
}
