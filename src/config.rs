use figment::providers::{Env, Format, Json, Yaml};
use figment::Figment;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::Network;

/// Deployment profile, selected by the `SCOPE` environment variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Test,
    Prod,
}

impl Profile {
    /// Resolve the profile from a raw `SCOPE` value.
    ///
    /// Unknown scopes fall back to `Dev`; a missing scope is an error.
    pub fn from_scope(scope: Option<&str>) -> Result<Self, String> {
        let scope = scope
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or("can not start application without 'SCOPE' environment variable")?;

        Ok(match scope.to_lowercase().as_str() {
            "prod" => Profile::Prod,
            "test" => Profile::Test,
            _ => Profile::Dev,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Dev => "dev",
            Profile::Test => "test",
            Profile::Prod => "prod",
        }
    }

    /// Bucket folder uploads are written under
    pub fn upload_folder(&self) -> &'static str {
        match self {
            Profile::Dev => "users-dev/",
            Profile::Test => "users-test/",
            Profile::Prod => "users-prod/",
        }
    }

    pub fn network(&self) -> Network {
        match self {
            Profile::Dev => Network::Emulator,
            Profile::Test => Network::Testnet,
            Profile::Prod => Network::Mainnet,
        }
    }

    pub fn is_dev(&self) -> bool {
        *self == Profile::Dev
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid LOG_FORMAT: {}. Must be one of: pretty, json", other)),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let config = Self {
            url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30),
            idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT_SECS", 600), // 10 minutes
            max_lifetime_secs: env_or("DATABASE_MAX_LIFETIME_SECS", 1800), // 30 minutes
            test_before_acquire: env_or("DATABASE_TEST_BEFORE_ACQUIRE", true),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }
        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/piggy".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

/// How long to wait for a submitted transaction to be sealed
#[derive(Debug, Clone, Copy)]
pub struct SealConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl SealConfig {
    pub fn from_env() -> Result<Self, String> {
        let poll_interval_ms: u64 = env_or("SEAL_POLL_INTERVAL_MS", 1000);
        let timeout_secs: u64 = env_or("SEAL_TIMEOUT_SECS", 120);

        if poll_interval_ms == 0 {
            return Err("SEAL_POLL_INTERVAL_MS must be greater than 0".to_string());
        }
        if timeout_secs == 0 {
            return Err("SEAL_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Twilio credentials for SMS delivery
#[derive(Debug, Clone, Default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub seal: SealConfig,
    pub profile: Profile,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub config_dir: PathBuf,
    pub ledger_config: PathBuf,
    pub firebase_project_id: Option<String>,
    pub firebase_api_key: String,
    pub sendgrid_api_key: String,
    pub twilio: TwilioConfig,
    pub google_access_token: Option<String>,
    pub dev_user_id: String,
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let profile = Profile::from_scope(env::var("SCOPE").ok().as_deref())?;
        let database = DatabaseConfig::from_env()?;
        let seal = SealConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let log_format = match env_opt("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None if profile.is_dev() => LogFormat::Pretty,
            None => LogFormat::Json,
        };

        let port = match env_opt("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| format!("Invalid PORT {}: {}", raw, e))?,
            None => 8000,
        };

        Ok(Self {
            database,
            seal,
            profile,
            port,
            log_level: log_level.to_lowercase(),
            log_format,
            config_dir: env_opt("CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("configfiles")),
            ledger_config: env_opt("LEDGER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./ledger.json")),
            firebase_project_id: env_opt("FIREBASE_PROJECT_ID"),
            firebase_api_key: env::var("FIREBASE_API_KEY").unwrap_or_default(),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").unwrap_or_default(),
            twilio: TwilioConfig {
                account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
                auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
                from_number: env::var("TWILIO_PHONE_NUMBER")
                    .unwrap_or_else(|_| "+19382531274".to_string()),
            },
            google_access_token: env_opt("GOOGLE_OAUTH_ACCESS_TOKEN"),
            dev_user_id: env_opt("DEV_USER_ID").unwrap_or_else(|| "dev-user".to_string()),
        })
    }

    /// Path of the profile's properties file
    pub fn properties_path(&self) -> PathBuf {
        self.config_dir
            .join(format!("properties-{}.yml", self.profile.as_str()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            seal: SealConfig::default(),
            profile: Profile::Dev,
            port: 8000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            config_dir: PathBuf::from("configfiles"),
            ledger_config: PathBuf::from("./ledger.json"),
            firebase_project_id: None,
            firebase_api_key: String::new(),
            sendgrid_api_key: String::new(),
            twilio: TwilioConfig::default(),
            google_access_token: None,
            dev_user_id: "dev-user".to_string(),
        }
    }
}

// ============================================================================
// Properties file (configfiles/properties-<profile>.yml)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SenderTemplates {
    pub invite: String,
    pub password_reset: String,
    pub verification_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderProperties {
    pub callback_url: String,
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    pub templates: SenderTemplates,
}

fn default_from_name() -> String {
    "Piggy".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageProperties {
    pub bucket: String,
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_public_url() -> String {
    "https://storage.cloud.google.com/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct KmsProperties {
    #[serde(default = "default_kms_location")]
    pub location: String,
    #[serde(default = "default_key_ring")]
    pub key_ring: String,
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_kms_location() -> String {
    "us-west2".to_string()
}

fn default_key_ring() -> String {
    "addresses-key-ring".to_string()
}

fn default_key() -> String {
    "addresses-key".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatastoreProperties {
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "Account".to_string()
}

impl Default for DatastoreProperties {
    fn default() -> Self {
        Self { kind: default_kind() }
    }
}

/// Per-profile settings for the Google project and its collaborators
#[derive(Debug, Clone, Deserialize)]
pub struct Properties {
    pub project_id: String,
    pub sender: SenderProperties,
    pub storage: StorageProperties,
    pub kms: KmsProperties,
    #[serde(default)]
    pub datastore: DatastoreProperties,
}

impl Properties {
    /// Load the YAML file, letting `PIGGY_`-prefixed variables override keys
    /// (nested keys use `__`, e.g. `PIGGY_STORAGE__BUCKET`).
    pub fn load(path: &Path) -> Result<Self, String> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PIGGY_").split("__"))
            .extract()
            .map_err(|e| format!("Invalid properties file {}: {}", path.display(), e))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, String> {
        Figment::new()
            .merge(Yaml::string(raw))
            .extract()
            .map_err(|e| format!("Invalid properties: {}", e))
    }

    /// Fully-qualified name of the key used to wrap custodial private keys
    pub fn kms_key_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.project_id, self.kms.location, self.kms.key_ring, self.kms.key
        )
    }
}

// ============================================================================
// Ledger file (ledger.json)
// ============================================================================

/// Service account used as proposer and payer on one network
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceAccountEntry {
    #[serde(default)]
    pub address: String,
    /// Base58 secret key or a JSON byte array
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkAccounts {
    #[serde(default)]
    pub emulator: ServiceAccountEntry,
    #[serde(default)]
    pub testnet: ServiceAccountEntry,
    #[serde(default)]
    pub mainnet: ServiceAccountEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkEndpoints {
    pub emulator: Option<String>,
    pub testnet: Option<String>,
    pub mainnet: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub accounts: NetworkAccounts,
    #[serde(default)]
    pub networks: NetworkEndpoints,
    #[serde(default)]
    pub contracts: HashMap<String, String>,
}

impl LedgerFile {
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Err(format!("Ledger config file {} not found", path.display()));
        }
        Figment::new()
            .merge(Json::file(path))
            .extract()
            .map_err(|e| format!("Invalid ledger config {}: {}", path.display(), e))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        Figment::new()
            .merge(Json::string(raw))
            .extract()
            .map_err(|e| format!("Invalid ledger config: {}", e))
    }

    pub fn account(&self, network: Network) -> &ServiceAccountEntry {
        match network {
            Network::Emulator => &self.accounts.emulator,
            Network::Testnet => &self.accounts.testnet,
            Network::Mainnet => &self.accounts.mainnet,
        }
    }

    /// RPC endpoint for the network, falling back to the public default
    pub fn rpc_url(&self, network: Network) -> String {
        let configured = match network {
            Network::Emulator => self.networks.emulator.as_ref(),
            Network::Testnet => self.networks.testnet.as_ref(),
            Network::Mainnet => self.networks.mainnet.as_ref(),
        };
        configured
            .filter(|url| !url.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| network.default_rpc_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_scope() {
        assert_eq!(Profile::from_scope(Some("prod")).unwrap(), Profile::Prod);
        assert_eq!(Profile::from_scope(Some("TEST")).unwrap(), Profile::Test);
        assert_eq!(Profile::from_scope(Some("staging")).unwrap(), Profile::Dev);
        assert!(Profile::from_scope(None).is_err());
        assert!(Profile::from_scope(Some("  ")).is_err());
    }

    #[test]
    fn test_profile_upload_folder_and_network() {
        assert_eq!(Profile::Prod.upload_folder(), "users-prod/");
        assert_eq!(Profile::Dev.upload_folder(), "users-dev/");
        assert_eq!(Profile::Test.network(), Network::Testnet);
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.seal.poll_interval, Duration::from_secs(1));
        assert!(config.profile.is_dev());
        assert_eq!(
            config.properties_path(),
            PathBuf::from("configfiles/properties-dev.yml")
        );
    }

    #[test]
    fn test_database_config_validation() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_properties_from_yaml() {
        let raw = r#"
project_id: piggy-test
sender:
  callback_url: https://app.piggy.test/
  from_email: hello@piggy.test
  templates:
    invite: d-invite
    password_reset: d-reset
    verification_code: d-code
storage:
  bucket: piggy-bucket
kms: {}
"#;
        let properties = Properties::from_yaml_str(raw).unwrap();
        assert_eq!(properties.sender.from_name, "Piggy");
        assert_eq!(properties.datastore.kind, "Account");
        assert_eq!(
            properties.kms_key_name(),
            "projects/piggy-test/locations/us-west2/keyRings/addresses-key-ring/cryptoKeys/addresses-key"
        );
    }

    #[test]
    fn test_properties_missing_field() {
        assert!(Properties::from_yaml_str("project_id: x").is_err());
    }

    #[test]
    fn test_ledger_file_rpc_fallback() {
        let raw = r#"{
            "accounts": { "testnet": { "address": "abc", "key": "[1,2,3]" } },
            "networks": { "emulator": "http://localhost:9999" },
            "contracts": { "piggy": "5WXKNb3skc3cusFxcy1gjMJccmD32uhD5ezVcgK7xtgH" }
        }"#;
        let file = LedgerFile::from_json_str(raw).unwrap();
        assert_eq!(file.rpc_url(Network::Emulator), "http://localhost:9999");
        assert_eq!(file.rpc_url(Network::Mainnet), Network::Mainnet.default_rpc_url());
        assert_eq!(file.account(Network::Testnet).address, "abc");
        assert!(file.account(Network::Mainnet).key.is_empty());
    }
}
