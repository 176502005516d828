//! The slice of SCIM 2.0 the broker touches: the list response of a user
//! search (also the response shape of a patch against this provider), and
//! the PatchOp request used to remove a single FIDO2 registration.
//!
//! The provider stores FIDO2 credential metadata under a vendor extension
//! schema. Its URN is deliberately not baked into these types - resources
//! keep their extension attributes as an opaque map, and the normalizer
//! looks the configured URN up at runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const SCIM_SCHEMA_PATCHOP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// A user search or patch result: `{totalResults, Resources: [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimListResponse {
    #[serde(rename = "totalResults")]
    pub total_results: u64,
    #[serde(rename = "Resources", default)]
    pub resources: Vec<ScimResource>,
}

/// One directory record. Every attribute other than `id` - core fields and
/// extension schemas alike - lands in the flattened map untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimResource {
    pub id: String,
    #[serde(flatten)]
    pub attrs: BTreeMap<String, Value>,
}

/// Value shape of the provider's FIDO2-registrations extension attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fido2RegistrationsExtension {
    #[serde(default)]
    pub fido2registrations: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimPatchOp {
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimPatchOperation {
    pub op: String,
    pub path: String,
}

impl ScimPatchOp {
    /// A single-operation remove, e.g. of one entry of a multi-valued
    /// extension attribute selected by a value filter.
    pub fn remove(path: String) -> Self {
        ScimPatchOp {
            schemas: vec![SCIM_SCHEMA_PATCHOP.to_string()],
            operations: vec![ScimPatchOperation {
                op: "remove".to_string(),
                path,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_response_with_extension() {
        let body = r#"{
            "totalResults": 1,
            "Resources": [
                {
                    "id": "S1",
                    "userName": "alice",
                    "urn:example:ext": {"fido2registrations": [{"credentialId": "C1"}]}
                }
            ]
        }"#;
        let rsp: ScimListResponse = serde_json::from_str(body).expect("failed to parse");
        assert_eq!(rsp.total_results, 1);
        assert_eq!(rsp.resources[0].id, "S1");

        let ext: Fido2RegistrationsExtension = serde_json::from_value(
            rsp.resources[0]
                .attrs
                .get("urn:example:ext")
                .expect("extension missing")
                .clone(),
        )
        .expect("failed to parse extension");
        assert_eq!(ext.fido2registrations.len(), 1);
    }

    #[test]
    fn parse_list_response_without_resources() {
        let rsp: ScimListResponse =
            serde_json::from_str(r#"{"totalResults": 0}"#).expect("failed to parse");
        assert_eq!(rsp.total_results, 0);
        assert!(rsp.resources.is_empty());
    }

    #[test]
    fn patch_op_wire_shape() {
        let op = ScimPatchOp::remove("urn:example:ext:fido2registrations[credentialId eq C1]".to_string());
        let s = serde_json::to_value(&op).expect("failed to serialise PatchOp");
        assert_eq!(s["schemas"][0], SCIM_SCHEMA_PATCHOP);
        assert_eq!(s["Operations"][0]["op"], "remove");
        assert_eq!(
            s["Operations"][0]["path"],
            "urn:example:ext:fido2registrations[credentialId eq C1]"
        );
    }
}
