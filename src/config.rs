use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use safe_sdk::utxo::MAX_QUERY_LIMIT;
use safe_sdk::{Address, ApiHost, DEFAULT_OPERATION_TAG, RetryPolicy, SafeApiClient};
use serde::Deserialize;

use crate::error::{AppError, Result};

pub const CONFIG_FILE: &str = "safe_config.json";
pub const ACCESS_TOKEN_ENV: &str = "SAFE_ACCESS_TOKEN";

const DEFAULT_UTXO_LIMIT: usize = 500;

// ============================================================================
// Config file
// ============================================================================

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_host: ApiHost,
    /// Overrides the host's URL when set.
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub operation_tag: String,
    pub utxo_limit: usize,
    pub request_timeout_secs: u64,
    pub ghost_retry: GhostRetryConfig,
    pub group: Option<GroupConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GhostRetryConfig {
    pub attempts: u32,
    pub timeout_secs: u64,
    pub backoff_ms: u64,
}

/// Default destination when a transfer names none.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub mix_address: Option<String>,
    pub members: Vec<String>,
    pub threshold: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_host: ApiHost::default(),
            base_url: None,
            access_token: None,
            user_id: None,
            operation_tag: DEFAULT_OPERATION_TAG.to_string(),
            utxo_limit: DEFAULT_UTXO_LIMIT,
            request_timeout_secs: 15,
            ghost_retry: GhostRetryConfig::default(),
            group: None,
        }
    }
}

impl Default for GhostRetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            timeout_secs: policy.timeout.as_secs(),
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

// Keeps the access token out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_host", &self.api_host)
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("operation_tag", &self.operation_tag)
            .field("utxo_limit", &self.utxo_limit)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("ghost_retry", &self.ghost_retry)
            .field("group", &self.group)
            .finish()
    }
}

impl AppConfig {
    /// Read `path`, falling back to defaults when it does not exist, then
    /// apply the environment token override.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::from_file(path)?;
        Ok(config.with_access_token(std::env::var(ACCESS_TOKEN_ENV).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| AppError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: AppConfig = serde_json::from_str(&contents).map_err(|e| AppError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config.normalized())
    }

    /// A non-empty `token` replaces the configured one.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.access_token = Some(token);
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.utxo_limit = self.utxo_limit.clamp(1, MAX_QUERY_LIMIT);
        self
    }

    /// Client for `base_url` when set, otherwise for the named host.
    pub fn api_client(&self) -> Result<SafeApiClient> {
        let token = self.access_token.clone();
        let client = match &self.base_url {
            Some(url) => SafeApiClient::new(url.as_str(), token, self.request_timeout())?,
            None => {
                log::info!("using the {} API host", self.api_host);
                SafeApiClient::for_host(self.api_host, token, self.request_timeout())?
            }
        };
        Ok(client)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.ghost_retry.attempts.max(1),
            timeout: Duration::from_secs(self.ghost_retry.timeout_secs),
            backoff: Duration::from_millis(self.ghost_retry.backoff_ms),
        }
    }

    /// The configured group as an address, if any.
    pub fn group_address(&self) -> Result<Option<Address>> {
        self.group.as_ref().map(GroupConfig::address).transpose()
    }
}

impl GroupConfig {
    /// `mix_address` when it parses, otherwise built from members.
    pub fn address(&self) -> Result<Address> {
        if let Some(encoded) = &self.mix_address {
            match encoded.parse::<Address>() {
                Ok(address) => return Ok(address),
                Err(e) => log::warn!("group mix_address unusable ({e}); using members"),
            }
        }
        Ok(Address::from_member_ids(&self.members, self.threshold)?)
    }
}
