//! Client configuration.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use cofhe_core::{CofheError, CofheResult, ErrorCode, ResultExt};
use cofhe_permits::DEFAULT_EXPIRATION_SECS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which decryption backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local chain with the mock query-decrypter contract.
    #[default]
    Mock,
    /// Live threshold network.
    Network,
}

/// Configuration problems found by [`CofheConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chain id must be non-zero")]
    ZeroChainId,

    #[error("{0} must be set to a non-zero address")]
    MissingAddress(&'static str),

    #[error("{0} is required for this environment")]
    MissingUrl(&'static str),

    #[error("{field} is not an http(s) url: {url}")]
    InvalidUrl { field: &'static str, url: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl From<ConfigError> for CofheError {
    fn from(err: ConfigError) -> Self {
        CofheError::new(ErrorCode::InvalidConfig, err.to_string()).with_cause(err)
    }
}

/// Everything the client needs to know about its deployment.
///
/// Deserializes from camelCase JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CofheConfig {
    pub environment: Environment,
    pub chain_id: u64,
    /// ACL contract. Verifying contract of every permit signature.
    pub acl_address: Address,
    /// Mock query-decrypter contract. Used in [`Environment::Mock`].
    pub query_decrypter_address: Address,
    /// Artificial latency before a mock decryption.
    pub mock_decrypt_delay_ms: u64,
    /// JSON-RPC endpoint for chain reads. Used in [`Environment::Mock`].
    pub rpc_url: Option<String>,
    /// Threshold network base URL. Used in [`Environment::Network`].
    pub threshold_network_url: Option<String>,
    /// Input verifier base URL.
    pub zk_verifier_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Lifetime of permits created without an explicit expiration.
    pub permit_expiration_secs: u64,
    pub default_security_zone: u8,
    /// Validator id used by `decrypt_with_active`.
    pub default_validator_id: U256,
}

impl Default for CofheConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Mock,
            chain_id: 31337,
            acl_address: Address::ZERO,
            query_decrypter_address: Address::ZERO,
            mock_decrypt_delay_ms: 0,
            rpc_url: None,
            threshold_network_url: None,
            zk_verifier_url: None,
            request_timeout_secs: cofhe_net::http::DEFAULT_TIMEOUT.as_secs(),
            permit_expiration_secs: DEFAULT_EXPIRATION_SECS,
            default_security_zone: 0,
            default_validator_id: U256::ZERO,
        }
    }
}

impl CofheConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(raw: &str) -> CofheResult<Self> {
        let config: Self =
            serde_json::from_str(raw).with_code(ErrorCode::InvalidConfig, "malformed config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_acl(mut self, acl: Address) -> Self {
        self.acl_address = acl;
        self
    }

    pub fn with_query_decrypter(mut self, address: Address) -> Self {
        self.query_decrypter_address = address;
        self
    }

    pub fn with_mock_decrypt_delay(mut self, delay: Duration) -> Self {
        self.mock_decrypt_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_threshold_network_url(mut self, url: impl Into<String>) -> Self {
        self.threshold_network_url = Some(url.into());
        self
    }

    pub fn with_zk_verifier_url(mut self, url: impl Into<String>) -> Self {
        self.zk_verifier_url = Some(url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_permit_expiration(mut self, secs: u64) -> Self {
        self.permit_expiration_secs = secs;
        self
    }

    pub fn with_default_security_zone(mut self, zone: u8) -> Self {
        self.default_security_zone = zone;
        self
    }

    pub fn with_default_validator_id(mut self, validator_id: U256) -> Self {
        self.default_validator_id = validator_id;
        self
    }

    pub fn mock_decrypt_delay(&self) -> Duration {
        Duration::from_millis(self.mock_decrypt_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the fields the selected environment relies on.
    ///
    /// URLs are only required by [`crate::CofheClient::connect`]; here they
    /// are checked for shape when present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::ZeroChainId);
        }
        if self.acl_address == Address::ZERO {
            return Err(ConfigError::MissingAddress("aclAddress"));
        }
        if self.environment == Environment::Mock && self.query_decrypter_address == Address::ZERO {
            return Err(ConfigError::MissingAddress("queryDecrypterAddress"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("requestTimeoutSecs"));
        }
        if self.permit_expiration_secs == 0 {
            return Err(ConfigError::ZeroDuration("permitExpirationSecs"));
        }

        check_url("rpcUrl", self.rpc_url.as_deref())?;
        check_url("thresholdNetworkUrl", self.threshold_network_url.as_deref())?;
        check_url("zkVerifierUrl", self.zk_verifier_url.as_deref())?;
        Ok(())
    }
}

/// A URL the selected environment cannot do without.
pub(crate) fn require_url<'a>(
    field: &'static str,
    url: Option<&'a str>,
) -> Result<&'a str, ConfigError> {
    url.ok_or(ConfigError::MissingUrl(field))
}

fn check_url(field: &'static str, url: Option<&str>) -> Result<(), ConfigError> {
    match url {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
            Err(ConfigError::InvalidUrl {
                field,
                url: url.to_string(),
            })
        }
        _ => Ok(()),
    }
}
