use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The error taxonomy of the broker. The kind is what callers inside the
/// process branch on; the message is the only part that may reach the
/// browser, so every constructor is responsible for keeping upstream
/// diagnostic detail out of it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// A required field was missing or malformed in the inbound request.
    #[error("{0}")]
    InvalidInput(String),
    /// The caller tried to act for an identity other than the one bound to
    /// their session, or was not authenticated at all.
    #[error("{0}")]
    Unauthorized(String),
    /// An upstream service could not be reached, timed out, or answered
    /// with something we could not use.
    #[error("{0}")]
    UpstreamUnavailable(String),
    /// An upstream service was reachable and reported a domain error. The
    /// message is the provider's own, forwarded when it is user-actionable
    /// (password rejections, ceremony rejections).
    #[error("{0}")]
    Upstream(String),
    /// The SCIM directory returned zero or more than one record where
    /// exactly one was required.
    #[error("{0}")]
    DirectoryInconsistency(String),
}

/// The only error shape ever serialized to the browser. The framing layer
/// sends this with an HTTP success status - clients branch on `status`,
/// not the status line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl From<&BrokerError> for ErrorResponse {
    fn from(err: &BrokerError) -> Self {
        ErrorResponse {
            status: "failed".to_string(),
            error_message: err.to_string(),
        }
    }
}

/// Inbound password login body. Both fields are optional at the wire
/// level so that the broker, not serde, decides how to report absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRegistrationRequest {
    #[serde(rename = "credentialId", default)]
    pub credential_id: Option<String>,
}

/// The single stable response shape for login, status and
/// delete-registration calls.
///
/// Credentials are opaque provider records - the broker passes them
/// through without interpreting anything past their presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<Value>>,
}

impl UserResponse {
    pub fn unauthenticated() -> Self {
        UserResponse {
            authenticated: false,
            username: None,
            credentials: None,
        }
    }
}

/// Password verification request for the provider's authentication policy
/// service. `PolicyId` is only present for the in-body kickoff method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordVerifyRequest {
    #[serde(rename = "PolicyId", skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub operation: String,
    pub username: String,
    pub password: String,
}

/// Response of the FIDO2 assertion-result endpoint when used to complete
/// a login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionResultResponse {
    pub status: String,
    #[serde(default)]
    pub user: Option<AssertionUser>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionUser {
    pub name: String,
}
