//! Configuration loading and root folder resolution
//!
//! Settings are resolved in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error: the service starts on defaults
//! and logs a warning. A config file that exists but cannot be parsed is
//! fatal.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default lifetime of signed object-store URLs
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Path to SQLite database file (defaults to `<root_folder>/cobham.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Folder holding the database and locally stored media
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub supabase: SupabaseConfig,

    #[serde(default)]
    pub paypal: PaypalConfig,

    #[serde(default)]
    pub subscriptions: SubscriptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Which identity provider verifies bearer tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    #[default]
    Supabase,
    /// Fixed token table from `[[auth.tokens]]`, for local development
    Static,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub provider: IdentityBackend,

    #[serde(default)]
    pub tokens: Vec<StaticToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: uuid::Uuid,
    pub email: String,
}

/// Where uploaded media lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Supabase,
    /// Files under `<root_folder>/media`, served by the API itself
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_audio_bucket")]
    pub audio_bucket: String,

    #[serde(default = "default_artwork_bucket")]
    pub artwork_bucket: String,

    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,

    /// Base URL for locally served media (defaults to the server address)
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            audio_bucket: default_audio_bucket(),
            artwork_bucket: default_artwork_bucket(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupabaseConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub anon_key: Option<String>,

    #[serde(default)]
    pub service_role_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaypalMode {
    #[default]
    Sandbox,
    Live,
}

impl std::str::FromStr for PaypalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(PaypalMode::Sandbox),
            "live" | "production" => Ok(PaypalMode::Live),
            other => Err(Error::Config(format!("Unknown PayPal mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaypalConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub mode: PaypalMode,

    /// Webhook id used to verify webhook signatures (unverified if unset)
    #[serde(default)]
    pub webhook_id: Option<String>,
}

impl PaypalConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// How often expired subscriptions are swept (0 disables the sweep)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audio_bucket() -> String {
    "audio".to_string()
}

fn default_artwork_bucket() -> String {
    "artwork".to_string()
}

fn default_signed_url_ttl() -> u64 {
    DEFAULT_SIGNED_URL_TTL_SECS
}

fn default_sweep_interval() -> u64 {
    3600
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub root_folder: PathBuf,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub supabase: SupabaseConfig,
    pub paypal: PaypalConfig,
    pub subscriptions: SubscriptionConfig,
}

impl Config {
    /// Load configuration from the TOML file, environment and CLI overrides
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match overrides.config_path.clone().or_else(find_config_file) {
            Some(path) if path.exists() => load_toml(&path)?,
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                TomlConfig::default()
            }
            None => {
                warn!("No config file found, using defaults");
                TomlConfig::default()
            }
        };

        Self::resolve(toml_config, overrides)
    }

    /// Apply environment and CLI overrides on top of a parsed TOML config
    pub fn resolve(mut toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        apply_env(&mut toml_config)?;

        let port = overrides.port.unwrap_or(toml_config.server.port);

        let root_folder = overrides
            .root_folder
            .or(toml_config.root_folder)
            .unwrap_or_else(default_root_folder);

        let database_path = overrides
            .database_path
            .or(toml_config.database_path)
            .unwrap_or_else(|| root_folder.join("cobham.db"));

        let config = Config {
            host: toml_config.server.host,
            port,
            database_path,
            root_folder,
            logging: toml_config.logging,
            auth: toml_config.auth,
            storage: toml_config.storage,
            supabase: toml_config.supabase,
            paypal: toml_config.paypal,
            subscriptions: toml_config.subscriptions,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("Port must be non-zero".to_string()));
        }

        if self.storage.backend == StorageBackend::Supabase
            && (self.supabase.url.is_none() || self.supabase.service_role_key.is_none())
        {
            return Err(Error::Config(
                "Supabase storage requires supabase.url and supabase.service_role_key".to_string(),
            ));
        }

        if self.auth.provider == IdentityBackend::Supabase
            && (self.supabase.url.is_none() || self.supabase.anon_key.is_none())
        {
            return Err(Error::Config(
                "Supabase authentication requires supabase.url and supabase.anon_key".to_string(),
            ));
        }

        if self.auth.provider == IdentityBackend::Static && self.auth.tokens.is_empty() {
            warn!("Static authentication configured without tokens; every request will be rejected");
        }

        Ok(())
    }

    /// Address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public base URL for locally served media
    pub fn media_base_url(&self) -> String {
        match &self.storage.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = if self.host == "0.0.0.0" { "127.0.0.1" } else { &self.host };
                format!("http://{}:{}", host, self.port)
            }
        }
    }
}

/// Parse a TOML config file
pub fn load_toml(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn apply_env(config: &mut TomlConfig) -> Result<()> {
    if let Some(host) = env_string("COBHAM_HOST") {
        config.server.host = host;
    }
    if let Some(port) = env_string("COBHAM_PORT") {
        config.server.port = port
            .parse()
            .map_err(|_| Error::Config(format!("COBHAM_PORT is not a valid port: {}", port)))?;
    }
    if let Some(path) = env_string("COBHAM_DATABASE") {
        config.database_path = Some(PathBuf::from(path));
    }
    if let Some(path) = env_string("COBHAM_ROOT_FOLDER") {
        config.root_folder = Some(PathBuf::from(path));
    }
    if let Some(level) = env_string("LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(url) = env_string("SUPABASE_URL") {
        config.supabase.url = Some(url);
    }
    if let Some(key) = env_string("SUPABASE_ANON_KEY") {
        config.supabase.anon_key = Some(key);
    }
    if let Some(key) = env_string("SUPABASE_SERVICE_ROLE_KEY") {
        config.supabase.service_role_key = Some(key);
    }
    if let Some(bucket) = env_string("SUPABASE_BUCKET_AUDIO") {
        config.storage.audio_bucket = bucket;
    }
    if let Some(bucket) = env_string("SUPABASE_BUCKET_ARTWORK") {
        config.storage.artwork_bucket = bucket;
    }

    if let Some(id) = env_string("PAYPAL_CLIENT_ID") {
        config.paypal.client_id = Some(id);
    }
    if let Some(secret) = env_string("PAYPAL_CLIENT_SECRET") {
        config.paypal.client_secret = Some(secret);
    }
    if let Some(id) = env_string("PAYPAL_WEBHOOK_ID") {
        config.paypal.webhook_id = Some(id);
    }
    if let Some(mode) = env_string("PAYPAL_MODE") {
        config.paypal.mode = mode.parse()?;
    }

    Ok(())
}

/// Locate the default config file: user config first, then system-wide
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("cobham").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/cobham/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cobham"))
        .unwrap_or_else(|| PathBuf::from("./cobham_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.audio_bucket, "audio");
        assert_eq!(config.storage.artwork_bucket, "artwork");
        assert_eq!(config.storage.signed_url_ttl_secs, 3600);
        assert_eq!(config.subscriptions.sweep_interval_secs, 3600);
        assert_eq!(config.paypal.mode, PaypalMode::Sandbox);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/cobham"

            [server]
            port = 8080

            [storage]
            backend = "local"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.audio_bucket, "audio");
        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/cobham")));
    }

    #[test]
    fn test_paypal_mode_parse() {
        assert_eq!("LIVE".parse::<PaypalMode>().unwrap(), PaypalMode::Live);
        assert_eq!("sandbox".parse::<PaypalMode>().unwrap(), PaypalMode::Sandbox);
        assert!("staging".parse::<PaypalMode>().is_err());
    }
}
