use rp_proto::scim_v1::{Fido2RegistrationsExtension, ScimListResponse};
use rp_proto::v1::{BrokerError, UserResponse};

use crate::session::SessionState;

/// Shape a SCIM search or patch result into the broker's stable user
/// response.
///
/// Exactly one matching record is required: zero means the identity the
/// session names does not exist upstream, more than one means the
/// directory is ambiguous, and both are hard errors rather than partial
/// success. On a match the record's directory id is cached on the session
/// so a later patch can skip the search.
///
/// The credential list lives under the provider's extension schema,
/// addressed by `extension_urn`. A record without the extension, or with
/// an extension missing its inner list, normalizes to an empty list.
pub(crate) fn to_user_response(
    session: &mut SessionState,
    result: ScimListResponse,
    extension_urn: &str,
) -> Result<UserResponse, BrokerError> {
    if result.total_results != 1 {
        return Err(BrokerError::DirectoryInconsistency(format!(
            "expected exactly one directory match, found {}",
            result.total_results
        )));
    }

    let resource = result.resources.into_iter().next().ok_or_else(|| {
        BrokerError::DirectoryInconsistency(
            "directory reported one match but returned no records".to_string(),
        )
    })?;

    let credentials = resource
        .attrs
        .get(extension_urn)
        .and_then(|value| {
            serde_json::from_value::<Fido2RegistrationsExtension>(value.clone()).ok()
        })
        .map(|ext| ext.fido2registrations)
        .unwrap_or_default();

    session.scim_id = Some(resource.id);

    Ok(UserResponse {
        authenticated: true,
        username: session.username.clone(),
        credentials: Some(credentials),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const URN: &str = "urn:example:fido2";

    fn alice_session() -> SessionState {
        SessionState {
            username: Some("alice".to_string()),
            scim_id: None,
        }
    }

    fn parse(body: serde_json::Value) -> ScimListResponse {
        serde_json::from_value(body).expect("failed to parse list response")
    }

    #[test]
    fn single_match_with_credentials() {
        let mut session = alice_session();
        let result = parse(json!({
            "totalResults": 1,
            "Resources": [
                {"id": "S1", URN: {"fido2registrations": [{"credentialId": "C1"}]}}
            ]
        }));

        let rsp = to_user_response(&mut session, result, URN).unwrap();
        assert!(rsp.authenticated);
        assert_eq!(rsp.username.as_deref(), Some("alice"));
        assert_eq!(rsp.credentials.unwrap().len(), 1);
        assert_eq!(session.scim_id.as_deref(), Some("S1"));
    }

    #[test]
    fn missing_extension_yields_empty_credentials() {
        let mut session = alice_session();
        let result = parse(json!({
            "totalResults": 1,
            "Resources": [{"id": "S1", "userName": "alice"}]
        }));

        let rsp = to_user_response(&mut session, result, URN).unwrap();
        assert_eq!(rsp.credentials, Some(vec![]));
    }

    #[test]
    fn extension_without_inner_list_yields_empty_credentials() {
        let mut session = alice_session();
        let result = parse(json!({
            "totalResults": 1,
            "Resources": [{"id": "S1", URN: {}}]
        }));

        let rsp = to_user_response(&mut session, result, URN).unwrap();
        assert_eq!(rsp.credentials, Some(vec![]));
    }

    #[test]
    fn zero_matches_is_a_directory_inconsistency() {
        let mut session = alice_session();
        let result = parse(json!({"totalResults": 0, "Resources": []}));

        assert!(matches!(
            to_user_response(&mut session, result, URN),
            Err(BrokerError::DirectoryInconsistency(_))
        ));
        assert!(session.scim_id.is_none());
    }

    #[test]
    fn multiple_matches_is_a_directory_inconsistency() {
        let mut session = alice_session();
        let result = parse(json!({
            "totalResults": 2,
            "Resources": [{"id": "S1"}, {"id": "S2"}]
        }));

        assert!(matches!(
            to_user_response(&mut session, result, URN),
            Err(BrokerError::DirectoryInconsistency(_))
        ));
    }
}
