use checkout_core::payment::CaptureMethod;
use checkout_shared::Masked;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub gateway: GatewayConfig,
    pub checkout: CheckoutConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_pending_ttl")]
    pub pending_reference_ttl_seconds: u64,
}

/// Provider credentials and behaviour.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub api_key: Masked<String>,
    pub webhook_secret: Masked<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
    #[serde(default)]
    pub capture_method: CaptureMethod,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutConfig {
    pub success_url: String, // may contain {order_id}
    pub cancel_url: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

fn default_max_connections() -> u32 { 5 }
fn default_pending_ttl() -> u64 { 3600 }
fn default_api_base_url() -> String { "https://api.stripe.com".to_string() }
fn default_webhook_tolerance() -> i64 { checkout_core::webhook::DEFAULT_TOLERANCE_SECS }
fn default_session_cookie() -> String { "checkout_session".to_string() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, uncommitted overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `CHECKOUT_GATEWAY__API_KEY=sk_live_...` sets `gateway.api_key`
            .add_source(config::Environment::with_prefix("CHECKOUT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
