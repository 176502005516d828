use rp_proto::v1::{
    BrokerError, DeleteRegistrationRequest, ErrorResponse, LoginRequest, UserResponse,
};
use serde_json::Value;

use crate::config::BrokerConfig;
use crate::guard;
use crate::normalize;
use crate::session::SessionState;
use crate::upstream::{PasswordVerdict, UpstreamClient};

const AUTHSVC_UNAVAILABLE: &str = "Error communicating with the authentication service";
const FIDO2_UNAVAILABLE: &str = "Error communicating with the FIDO2 server";
const SCIM_UNAVAILABLE: &str = "Error communicating with the SCIM server";

/// The four ceremony proxy routes, each carrying the authorization flags
/// the routing layer would otherwise have to remember:
///
/// * attestation/options - request must name the caller's own identity
/// * assertion/options - same, but an anonymous (empty) username is
///   allowed for discoverable-credential flows
/// * attestation/result, assertion/result - passed through without
///   identity validation; the FIDO2 server binds them to their options
///   phase itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyPath {
    AttestationOptions,
    AttestationResult,
    AssertionOptions,
    AssertionResult,
}

impl CeremonyPath {
    pub fn as_path(self) -> &'static str {
        match self {
            CeremonyPath::AttestationOptions => "/attestation/options",
            CeremonyPath::AttestationResult => "/attestation/result",
            CeremonyPath::AssertionOptions => "/assertion/options",
            CeremonyPath::AssertionResult => "/assertion/result",
        }
    }

    fn validate_username(self) -> bool {
        matches!(
            self,
            CeremonyPath::AttestationOptions | CeremonyPath::AssertionOptions
        )
    }

    fn allow_anonymous(self) -> bool {
        matches!(self, CeremonyPath::AssertionOptions)
    }
}

/// The five operations the routing layer dispatches to. Each is a single
/// linear pipeline - validate, authorize, obtain token, call upstream,
/// normalize - with no retries; the first failing step fails the
/// operation.
///
/// The broker owns the shared token cache and upstream client; session
/// state is owned by the caller and passed per request.
pub struct Broker {
    upstream: UpstreamClient,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Result<Self, reqwest::Error> {
        Ok(Broker {
            upstream: UpstreamClient::new(config)?,
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        self.upstream.config()
    }

    /// Render any broker error into the one JSON error shape sent to the
    /// browser. The framing layer serializes this with an HTTP success
    /// status; callers branch on the body's `status` field.
    pub fn error_response(err: &BrokerError) -> ErrorResponse {
        ErrorResponse::from(err)
    }

    /// Password login: verify the credentials with the authentication
    /// policy service, bind the username to the session, and answer with
    /// the user's current state.
    pub async fn password_login(
        &self,
        session: &mut SessionState,
        request: LoginRequest,
    ) -> Result<UserResponse, BrokerError> {
        let (username, password) = match (request.username, request.password) {
            (Some(username), Some(password)) => (username, password),
            _ => {
                return Err(BrokerError::InvalidInput(
                    "Invalid username and password".to_string(),
                ))
            }
        };

        match self.upstream.verify_password(&username, &password).await {
            Ok(PasswordVerdict::Accepted) => {
                session.username = Some(username);
                self.user_response(session).await
            }
            Ok(PasswordVerdict::Rejected(message)) => Err(BrokerError::Upstream(message)),
            Err(err) => {
                warn!(?err, "password verification call failed");
                Err(BrokerError::UpstreamUnavailable(
                    AUTHSVC_UNAVAILABLE.to_string(),
                ))
            }
        }
    }

    /// Session status: `{authenticated: false}` for an anonymous session,
    /// otherwise the username plus the credential list as the SCIM
    /// directory currently has it.
    pub async fn user_response(
        &self,
        session: &mut SessionState,
    ) -> Result<UserResponse, BrokerError> {
        let username = match session.authenticated_username() {
            Some(username) => username.to_string(),
            None => return Ok(UserResponse::unauthenticated()),
        };

        let result = self
            .upstream
            .scim_search_user(&username)
            .await
            .map_err(|err| {
                error!(?err, %username, "unable to get SCIM data for user");
                BrokerError::UpstreamUnavailable(SCIM_UNAVAILABLE.to_string())
            })?;

        self.normalize_directory_result(session, result, &username)
    }

    /// Forward a ceremony body to the FIDO2 service, after checking the
    /// caller is not acting for somebody else on the routes that validate
    /// identity. Success responses pass through verbatim.
    pub async fn proxy_ceremony(
        &self,
        session: &SessionState,
        path: CeremonyPath,
        body: &Value,
    ) -> Result<Value, BrokerError> {
        if path.validate_username() {
            guard::authorize(body, session.username.as_deref(), path.allow_anonymous())?;
        }

        self.upstream
            .fido2_post(path.as_path(), body)
            .await
            .map_err(|err| match err.structured_message() {
                Some(message) => BrokerError::Upstream(message.to_string()),
                None => {
                    warn!(?err, path = path.as_path(), "ceremony proxy call failed");
                    BrokerError::UpstreamUnavailable(FIDO2_UNAVAILABLE.to_string())
                }
            })
    }

    /// Complete a FIDO2 login: submit the assertion result, and when the
    /// FIDO2 server accepts it, adopt the asserted identity as the session
    /// user and answer with their current state.
    pub async fn fido2_login(
        &self,
        session: &mut SessionState,
        body: &Value,
    ) -> Result<UserResponse, BrokerError> {
        let outcome = self
            .upstream
            .fido2_assertion_result(body)
            .await
            .map_err(|err| {
                warn!(?err, "assertion result call failed");
                BrokerError::UpstreamUnavailable(FIDO2_UNAVAILABLE.to_string())
            })?;

        if outcome.status != "ok" {
            return Err(BrokerError::Upstream(
                outcome
                    .error_message
                    .unwrap_or_else(|| FIDO2_UNAVAILABLE.to_string()),
            ));
        }

        let name = outcome
            .user
            .map(|user| user.name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                warn!("assertion result was ok but carried no user identity");
                BrokerError::UpstreamUnavailable(FIDO2_UNAVAILABLE.to_string())
            })?;

        session.username = Some(name);
        self.user_response(session).await
    }

    /// Remove one registered credential and answer with the remaining
    /// list. Requires a logged-in session and a credential id; the
    /// directory id is taken from the session cache, or re-resolved with a
    /// search when the session predates it.
    pub async fn delete_registration(
        &self,
        session: &mut SessionState,
        request: DeleteRegistrationRequest,
    ) -> Result<UserResponse, BrokerError> {
        let username = match session.authenticated_username() {
            Some(username) => username.to_string(),
            None => return Err(BrokerError::Unauthorized("Not logged in".to_string())),
        };

        let credential_id = request
            .credential_id
            .ok_or_else(|| BrokerError::InvalidInput("Invalid credentialId".to_string()))?;

        if session.scim_id.is_none() {
            let result = self
                .upstream
                .scim_search_user(&username)
                .await
                .map_err(|err| {
                    error!(?err, %username, "unable to get SCIM data for user");
                    BrokerError::UpstreamUnavailable(SCIM_UNAVAILABLE.to_string())
                })?;
            self.normalize_directory_result(session, result, &username)?;
        }

        let scim_id = match session.scim_id.as_deref() {
            Some(scim_id) => scim_id.to_string(),
            // normalize always caches the id on success
            None => {
                return Err(BrokerError::UpstreamUnavailable(
                    SCIM_UNAVAILABLE.to_string(),
                ))
            }
        };

        let result = self
            .upstream
            .scim_remove_credential(&scim_id, &credential_id)
            .await
            .map_err(|err| {
                error!(?err, %username, "unable to update SCIM data for user");
                BrokerError::UpstreamUnavailable(SCIM_UNAVAILABLE.to_string())
            })?;

        self.normalize_directory_result(session, result, &username)
    }

    /// Run the normalizer and keep directory detail out of the
    /// caller-visible message; the specifics only go to the log.
    fn normalize_directory_result(
        &self,
        session: &mut SessionState,
        result: rp_proto::scim_v1::ScimListResponse,
        username: &str,
    ) -> Result<UserResponse, BrokerError> {
        normalize::to_user_response(session, result, &self.config().fido2_extension_urn).map_err(
            |err| {
                error!(%err, %username, "directory state inconsistent");
                BrokerError::DirectoryInconsistency(SCIM_UNAVAILABLE.to_string())
            },
        )
    }
}
