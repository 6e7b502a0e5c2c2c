use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CURRENCY: &str = "IDR";
const CONFIG_DIR: &str = "config";

/// Payment provider (Xendit-style hosted invoices) configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PaymentConfig {
    /// Secret API key, sent as the basic-auth username.
    pub api_key: String,

    /// Provider base URL.
    #[serde(default = "default_payment_base_url")]
    pub base_url: String,

    /// Shared secret expected in the `x-callback-token` webhook header.
    /// When unset, webhooks are accepted without verification.
    #[serde(default)]
    pub callback_token: Option<String>,

    /// Absolute invoice expiry handed to the provider, in seconds.
    #[serde(default = "default_invoice_expiry_secs")]
    pub invoice_expiry_secs: u64,

    /// Request timeout for provider calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Browser-facing redirect targets, keyed by external_id at runtime.
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
}

/// External invoice-document (PDF) service configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentsConfig {
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// ISO currency code used for all order and invoice amounts
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Mobile deep-link scheme used by the redirect pages
    #[serde(default = "default_app_scheme")]
    pub app_scheme: String,

    /// DB pool sizing
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[validate]
    pub payment: PaymentConfig,

    pub documents: Option<DocumentsConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_app_scheme() -> String {
    "storefront".to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_payment_base_url() -> String {
    "https://api.xendit.co".to_string()
}
fn default_invoice_expiry_secs() -> u64 {
    3600
}
fn default_request_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    /// Loads configuration from `config/default.toml` (optional), an
    /// environment-specific overlay, then `APP__`-prefixed environment
    /// variables (e.g. `APP__PAYMENT__API_KEY`).
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let builder = Config::builder()
            .add_source(File::from(Path::new(CONFIG_DIR).join("default")).required(false))
            .add_source(File::from(Path::new(CONFIG_DIR).join(&environment)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;

        config
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

        Ok(config)
    }
}
