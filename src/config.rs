use anyhow::{anyhow, Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;

/// Environment variable prefix, e.g. `CHECKOUT_SITE__PAYSTACK__SECRET_KEY`
pub const ENV_PREFIX: &str = "CHECKOUT";

pub const MAX_GATEWAY_RETRIES: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub site: SiteConfiguration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Per-site settings the payment flow consumes
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfiguration {
    /// Public base URL of the storefront, e.g. `https://shop.example.com`
    pub ecommerce_url: String,
    pub receipt_path: String,
    pub order_number_prefix: String,
    pub paystack: PaystackSettings,
}

impl SiteConfiguration {
    /// Absolute storefront URL for `path`
    pub fn ecommerce_url(&self, path: &str) -> String {
        let base = self.ecommerce_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct PaystackSettings {
    pub public_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub cancel_checkout_path: String,
    pub error_path: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl fmt::Debug for PaystackSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaystackSettings")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("cancel_checkout_path", &self.cancel_checkout_path)
            .field("error_path", &self.error_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Config {
    /// Load from `config/checkout.{toml,yaml,json}` (optional) overlaid with
    /// `CHECKOUT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::load(Some("config/checkout"))
    }

    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }

        Self::from_sources(
            builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    /// Defaults for every optional setting
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.environment", "development")?
            .set_default("database.max_connections", 20)?
            .set_default("site.receipt_path", "/checkout/receipt/")?
            .set_default("site.order_number_prefix", "EDX")?
            .set_default("site.paystack.base_url", "https://api.paystack.co")?
            .set_default("site.paystack.cancel_checkout_path", "/checkout/cancel-checkout/")?
            .set_default("site.paystack.error_path", "/checkout/error/")?
            .set_default("site.paystack.timeout_secs", 30)?
            .set_default("site.paystack.max_retries", 2)?;
        Ok(builder)
    }

    /// Build, deserialize and validate an assembled set of sources
    pub fn from_sources(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Config = builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Configuration is incomplete")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate port range
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE__URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE__MAX_CONNECTIONS must be greater than 0"));
        }

        self.site.validate()
    }
}

impl SiteConfiguration {
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.ecommerce_url)
            .with_context(|| format!("SITE__ECOMMERCE_URL is not a URL: {}", self.ecommerce_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("SITE__ECOMMERCE_URL must be http or https"));
        }

        if self.order_number_prefix.trim().is_empty() {
            return Err(anyhow!("SITE__ORDER_NUMBER_PREFIX cannot be empty"));
        }

        let paystack = &self.paystack;
        if paystack.public_key.trim().is_empty() {
            return Err(anyhow!("SITE__PAYSTACK__PUBLIC_KEY cannot be empty"));
        }
        if paystack.secret_key.trim().is_empty() {
            return Err(anyhow!("SITE__PAYSTACK__SECRET_KEY cannot be empty"));
        }
        if paystack.base_url.trim().is_empty() {
            return Err(anyhow!("SITE__PAYSTACK__BASE_URL cannot be empty"));
        }
        if paystack.timeout_secs == 0 {
            return Err(anyhow!("SITE__PAYSTACK__TIMEOUT_SECS must be greater than 0"));
        }
        if paystack.max_retries > MAX_GATEWAY_RETRIES {
            return Err(anyhow!(
                "SITE__PAYSTACK__MAX_RETRIES must be at most {}, got {}",
                MAX_GATEWAY_RETRIES,
                paystack.max_retries
            ));
        }

        Ok(())
    }
}
