use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::billing::{CheckoutConfig, DEFAULT_BILL_PREFIX, FaspayConfig};
use crate::error::KakasakuError;
use crate::utils::get_env_with_prefix;

/// Main configuration for a Kakasaku service
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Faspay credentials and endpoints.
    pub gateway: FaspayConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingConfig {
    /// Prefix of generated bill numbers.
    #[serde(default = "default_bill_prefix")]
    pub bill_prefix: String,
    /// Let the redirect's `status` settle a bill when the inquiry fails.
    #[serde(default = "default_trust_redirect_hint")]
    pub trust_redirect_hint: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            bill_prefix: default_bill_prefix(),
            trust_redirect_hint: default_trust_redirect_hint(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bill_prefix() -> String {
    DEFAULT_BILL_PREFIX.to_string()
}

fn default_trust_redirect_hint() -> bool {
    true
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl BillingConfig {
    /// Checkout settings derived from this config.
    pub fn checkout(&self) -> CheckoutConfig {
        CheckoutConfig::new().bill_prefix(self.bill_prefix.clone())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_gateway(mut self, gateway: FaspayConfig) -> Self {
        self.config.gateway = gateway;
        self
    }

    pub fn with_bill_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.billing.bill_prefix = prefix.into();
        self
    }

    pub fn with_trust_redirect_hint(mut self, trust: bool) -> Self {
        self.config.billing.trust_redirect_hint = trust;
        self
    }

    /// Load configuration from environment variables with KAKASAKU_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT").and_then(|p| p.parse().ok()) {
            self.config.server.port = port;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = parse_bool(&json).unwrap_or(false);
        }

        let gateway = &mut self.config.gateway;
        if let Some(user_id) = get_env_with_prefix("FASPAY_USER_ID") {
            gateway.user_id = user_id;
        }
        if let Some(password) = get_env_with_prefix("FASPAY_PASSWORD") {
            gateway.password = password.into();
        }
        if let Some(merchant_id) = get_env_with_prefix("FASPAY_MERCHANT_ID") {
            gateway.merchant_id = merchant_id;
        }
        if let Some(merchant_name) = get_env_with_prefix("FASPAY_MERCHANT_NAME") {
            gateway.merchant_name = merchant_name;
        }
        if let Some(url) = get_env_with_prefix("FASPAY_PAYMENT_URL") {
            gateway.payment_url = url;
        }
        if let Some(url) = get_env_with_prefix("FASPAY_INQUIRY_URL") {
            gateway.inquiry_url = url;
        }
        if let Some(url) = get_env_with_prefix("FASPAY_RETURN_URL") {
            gateway.return_url = url;
        }
        if let Some(timeout) = get_env_with_prefix("FASPAY_TIMEOUT_SECONDS").and_then(|t| t.parse().ok()) {
            gateway.timeout_seconds = timeout;
        }
        if let Some(retries) = get_env_with_prefix("FASPAY_MAX_RETRIES").and_then(|r| r.parse().ok()) {
            gateway.max_retries = retries;
        }

        if let Some(prefix) = get_env_with_prefix("BILL_PREFIX") {
            self.config.billing.bill_prefix = prefix;
        }
        if let Some(trust) = get_env_with_prefix("TRUST_REDIRECT_HINT").and_then(|t| parse_bool(&t)) {
            self.config.billing.trust_redirect_hint = trust;
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration is invalid:
    /// - Invalid server address (host:port)
    /// - Invalid log level
    /// - Missing Faspay credentials or endpoints
    /// - Zero gateway timeout or empty bill prefix
    pub fn build(self) -> crate::error::Result<Config> {
        self.config.server.addr().map_err(|e| {
            KakasakuError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        if self.config.server.port == 0 {
            return Err(KakasakuError::bad_request("Server port must be greater than 0"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(KakasakuError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        self.config
            .gateway
            .validate()
            .map_err(|e| KakasakuError::bad_request(e.to_string()))?;

        if self.config.gateway.timeout_seconds == 0 {
            return Err(KakasakuError::bad_request("Faspay timeout must be greater than 0"));
        }

        if self.config.billing.bill_prefix.trim().is_empty() {
            return Err(KakasakuError::bad_request("Bill prefix must not be empty"));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
