use rp_proto::v1::BrokerError;
use serde_json::Value;

/// Authorization gate for FIDO2 ceremony bodies.
///
/// A ceremony request names the identity it acts for in its `username`
/// field. A logged-in caller may only act for themselves, except that the
/// two legitimately anonymous flows (discoverable-credential assertion
/// options, fresh registration) may carry an empty username on routes
/// where `allow_anonymous` is set. Without a session, only those
/// anonymous flows are permitted.
///
/// Pure validation - no side effects, no network.
pub fn authorize(
    body: &Value,
    session_username: Option<&str>,
    allow_anonymous: bool,
) -> Result<(), BrokerError> {
    let requested = body
        .get("username")
        .and_then(Value::as_str)
        .ok_or_else(|| BrokerError::InvalidInput("Missing username in request".to_string()))?;

    match session_username {
        Some(current) if !current.is_empty() => {
            if requested == current || (allow_anonymous && requested.is_empty()) {
                Ok(())
            } else {
                Err(BrokerError::Unauthorized(
                    "Invalid username in request".to_string(),
                ))
            }
        }
        _ => {
            // No authenticated user. Only the anonymous flows may proceed.
            if requested.is_empty() && allow_anonymous {
                Ok(())
            } else {
                Err(BrokerError::Unauthorized("Not authenticated".to_string()))
            }
        }
    }
}
