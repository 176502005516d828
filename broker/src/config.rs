use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Remaining validity a cached access token must have at hand-out time.
pub const DEFAULT_TOKEN_MARGIN_SECONDS: u64 = 120;

/// Total bound on every outbound call; expiry surfaces as a transport
/// failure.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Extension schema under which the provider stores FIDO2 credential
/// metadata on a SCIM user. Matches IBM Security Verify Access; override
/// it in [`BrokerConfig`] for other directory schemas.
pub const DEFAULT_FIDO2_EXTENSION_URN: &str =
    "urn:ietf:params:scim:schemas:extension:isam:1.0:FIDO2Registrations";

/// Authentication policy used by the in-body password kickoff method.
pub const DEFAULT_PASSWORD_POLICY_ID: &str = "urn:ibm:security:authentication:asf:password";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse config file: {0}")]
    Parse(String),
    #[error("missing required config option '{0}'")]
    Missing(&'static str),
}

/// How the password-verify call names its authentication policy: as a
/// `PolicyId` field in the request body, or as a `/policy/password`
/// suffix on the endpoint URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordKickoff {
    PolicyBody,
    PolicyPath,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub token_endpoint: Url,
    pub client_id: String,
    pub client_secret: String,
    pub authsvc_endpoint: Url,
    pub password_kickoff: PasswordKickoff,
    pub password_policy_id: String,
    pub fido2_endpoint: Url,
    pub scim_endpoint: Url,
    pub fido2_extension_urn: String,
    pub token_margin_seconds: u64,
    pub request_timeout_seconds: u64,
}

/// On-disk shape of the broker config. Everything is optional here so a
/// file can carry just the deployment-specific parts; [`BrokerConfig`]
/// decides what is actually required.
#[derive(Debug, Default, Deserialize)]
pub struct BrokerConfigFile {
    pub token_endpoint: Option<Url>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authsvc_endpoint: Option<Url>,
    pub password_kickoff: Option<PasswordKickoff>,
    pub password_policy_id: Option<String>,
    pub fido2_endpoint: Option<Url>,
    pub scim_endpoint: Option<Url>,
    pub fido2_extension_urn: Option<String>,
    pub token_margin_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

impl BrokerConfig {
    pub fn new(
        token_endpoint: Url,
        client_id: &str,
        client_secret: &str,
        authsvc_endpoint: Url,
        fido2_endpoint: Url,
        scim_endpoint: Url,
    ) -> Self {
        BrokerConfig {
            token_endpoint,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            authsvc_endpoint,
            password_kickoff: PasswordKickoff::PolicyBody,
            password_policy_id: DEFAULT_PASSWORD_POLICY_ID.to_string(),
            fido2_endpoint,
            scim_endpoint,
            fido2_extension_urn: DEFAULT_FIDO2_EXTENSION_URN.to_string(),
            token_margin_seconds: DEFAULT_TOKEN_MARGIN_SECONDS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
        }
    }

    pub fn password_kickoff(mut self, kickoff: PasswordKickoff) -> Self {
        self.password_kickoff = kickoff;
        self
    }

    pub fn password_policy_id(mut self, policy_id: &str) -> Self {
        self.password_policy_id = policy_id.to_string();
        self
    }

    pub fn fido2_extension_urn(mut self, urn: &str) -> Self {
        self.fido2_extension_urn = urn.to_string();
        self
    }

    pub fn token_margin_seconds(mut self, secs: u64) -> Self {
        self.token_margin_seconds = secs;
        self
    }

    pub fn request_timeout_seconds(mut self, secs: u64) -> Self {
        self.request_timeout_seconds = secs;
        self
    }

    pub fn token_margin(&self) -> Duration {
        Duration::from_secs(self.token_margin_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Parse a complete config from TOML. The endpoints and the OAuth
    /// client credentials are required; everything else falls back to the
    /// documented defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: BrokerConfigFile = toml::from_str(contents).map_err(|e| {
            error!("{:?}", e);
            ConfigError::Parse(format!("{:?}", e))
        })?;

        let config = BrokerConfig::new(
            file.token_endpoint
                .ok_or(ConfigError::Missing("token_endpoint"))?,
            &file.client_id.ok_or(ConfigError::Missing("client_id"))?,
            &file
                .client_secret
                .ok_or(ConfigError::Missing("client_secret"))?,
            file.authsvc_endpoint
                .ok_or(ConfigError::Missing("authsvc_endpoint"))?,
            file.fido2_endpoint
                .ok_or(ConfigError::Missing("fido2_endpoint"))?,
            file.scim_endpoint
                .ok_or(ConfigError::Missing("scim_endpoint"))?,
        );

        let config = match file.password_kickoff {
            Some(kickoff) => config.password_kickoff(kickoff),
            None => config,
        };
        let config = match file.password_policy_id {
            Some(ref policy_id) => config.password_policy_id(policy_id),
            None => config,
        };
        let config = match file.fido2_extension_urn {
            Some(ref urn) => config.fido2_extension_urn(urn),
            None => config,
        };
        let config = match file.token_margin_seconds {
            Some(secs) => config.token_margin_seconds(secs),
            None => config,
        };
        let config = match file.request_timeout_seconds {
            Some(secs) => config.request_timeout_seconds(secs),
            None => config,
        };

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self, ConfigError> {
        debug!("Attempting to load broker config from {:?}", path);
        let mut f = File::open(&path)?;
        let mut contents = String::new();
        f.read_to_string(&mut contents)?;
        Self::from_toml_str(contents.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        token_endpoint = "https://idp.example.com/oauth/token"
        client_id = "rp-broker"
        client_secret = "s3cret"
        authsvc_endpoint = "https://idp.example.com/apiauthsvc"
        fido2_endpoint = "https://idp.example.com/fido2"
        scim_endpoint = "https://idp.example.com/scim"
        password_kickoff = "policy_path"
        token_margin_seconds = 60
    "#;

    #[test]
    fn parse_full_config() {
        let config = BrokerConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.client_id, "rp-broker");
        assert_eq!(config.password_kickoff, PasswordKickoff::PolicyPath);
        assert_eq!(config.token_margin_seconds, 60);
        // untouched knobs keep their defaults
        assert_eq!(
            config.request_timeout_seconds,
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        );
        assert_eq!(config.fido2_extension_urn, DEFAULT_FIDO2_EXTENSION_URN);
        assert_eq!(config.password_policy_id, DEFAULT_PASSWORD_POLICY_ID);
    }

    #[test]
    fn missing_required_option_is_an_error() {
        let result = BrokerConfig::from_toml_str(r#"client_id = "rp-broker""#);
        assert!(matches!(
            result,
            Err(ConfigError::Missing("token_endpoint"))
        ));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let result = BrokerConfig::from_toml_str("this is not toml = = =");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
