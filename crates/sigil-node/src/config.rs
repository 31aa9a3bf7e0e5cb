//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Full configuration for the Sigil node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SigilConfig {
    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// DID issuance settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Anchoring worker and ledger settings.
    #[serde(default)]
    pub anchoring: AnchoringConfig,

    /// Authentication provider settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Credential lifecycle settings.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Path to the data directory (RocksDB backend).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// DID method used for new identifiers.
    #[serde(default = "default_did_method")]
    pub did_method: String,
    /// Hex encoded 32-byte key sealing generated private keys. When absent
    /// an ephemeral key is generated at startup.
    #[serde(default)]
    pub master_key: Option<String>,
    /// Return the generated private key in the issuance response.
    #[serde(default)]
    pub return_private_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Simulated,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchoringConfig {
    #[serde(default = "default_ledger")]
    pub ledger: LedgerKind,
    /// Endpoint receiving operations when `ledger = "http"`.
    #[serde(default)]
    pub ledger_endpoint: Option<String>,
    /// Attempts per job before it is abandoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further attempt.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Upper bound on a single ledger submission.
    #[serde(default = "default_ledger_timeout_ms")]
    pub ledger_timeout_ms: u64,
    /// How often the worker rescans the store for queued jobs it was not
    /// handed, e.g. because the queue was full.
    #[serde(default = "default_rescan_secs")]
    pub rescan_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Identity provider base URL; bearer tokens are checked against
    /// `<provider_url>/auth/v1/user`.
    #[serde(default)]
    pub provider_url: Option<String>,
    /// API key sent to the identity provider.
    #[serde(default)]
    pub provider_api_key: Option<String>,
    /// Fixed tokens, used when no provider is configured.
    #[serde(default)]
    pub static_tokens: Vec<StaticToken>,
    /// User ids whose profile is created with the admin role.
    #[serde(default)]
    pub bootstrap_admins: Vec<String>,
    /// Upper bound on a token check against the provider.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Seconds between expiry sweeps.
    #[serde(default = "default_expiry_sweep_secs")]
    pub expiry_sweep_secs: u64,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    9101
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::Rocksdb
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_did_method() -> String {
    "ion".into()
}
fn default_ledger() -> LedgerKind {
    LedgerKind::Simulated
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_backoff_ms() -> u64 {
    500
}
fn default_ipfs_gateway() -> String {
    "https://ipfs.io".into()
}
fn default_queue_capacity() -> usize {
    256
}
fn default_ledger_timeout_ms() -> u64 {
    30_000
}
fn default_rescan_secs() -> u64 {
    30
}
fn default_provider_timeout_ms() -> u64 {
    5_000
}
fn default_expiry_sweep_secs() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            did_method: default_did_method(),
            master_key: None,
            return_private_key: false,
        }
    }
}

impl Default for AnchoringConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger(),
            ledger_endpoint: None,
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            ipfs_gateway: default_ipfs_gateway(),
            queue_capacity: default_queue_capacity(),
            ledger_timeout_ms: default_ledger_timeout_ms(),
            rescan_secs: default_rescan_secs(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            provider_api_key: None,
            static_tokens: Vec::new(),
            bootstrap_admins: Vec::new(),
            provider_timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            expiry_sweep_secs: default_expiry_sweep_secs(),
        }
    }
}

impl SigilConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: SigilConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// In-memory node suitable for tests and local experiments.
    pub fn ephemeral() -> Self {
        let mut config = Self::default();
        config.storage.backend = StorageBackend::Memory;
        config.api.port = 0;
        config
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }
}
