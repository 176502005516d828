use serde::{Deserialize, Serialize};

/// Form body of a client-credentials token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
}

impl AccessTokenRequest {
    pub fn client_credentials(client_id: &str, client_secret: &str) -> Self {
        AccessTokenRequest {
            grant_type: "client_credentials".to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }
}

/// The subset of the token endpoint's response the broker needs. Providers
/// send more (token_type, scope, ...) which serde drops here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}
