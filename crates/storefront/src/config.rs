//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DANITHUR_API_URL` - Base URL of the dealership backend REST API
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (default: http://localhost:3000)
//! - `DANITHUR_API_TOKEN` - Bearer token for the backend API (validated for strength)
//! - `POSTAL_LOOKUP_URL` - Postal code service base URL (default: https://viacep.com.br/ws)
//! - `HTTP_TIMEOUT_SECS` - Timeout for outbound requests (default: 10)
//! - `PIX_POLL_INTERVAL_SECS` - Pix payment status polling interval (default: 15)
//! - `PIX_DEFAULT_EXPIRY_SECS` - Pix expiry when the backend sends none (default: 1800)
//! - `BOLETO_DUE_DAYS` - Days until a generated boleto is due (default: 3)
//! - `CHECKOUT_IDLE_TIMEOUT_SECS` - Idle time before a checkout is discarded (default: 3600)
//! - `MERCHANT_NAME`, `MERCHANT_CITY`, `MERCHANT_PHONE`, `MERCHANT_EMAIL` - Receipt details
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Dealership backend API
    pub api: BackendApiConfig,
    /// Postal code lookup service
    pub postal: PostalLookupConfig,
    /// Checkout timing rules
    pub checkout: CheckoutConfig,
    /// Merchant details printed on receipts
    pub merchant: MerchantInfo,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Dealership backend API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct BackendApiConfig {
    /// Base URL, without trailing slash (e.g., <https://api.danithur.com.br/api>)
    pub base_url: String,
    /// Optional bearer token
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendApiConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Postal code lookup service configuration.
#[derive(Debug, Clone)]
pub struct PostalLookupConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Checkout timing rules.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutConfig {
    /// Countdown granularity
    pub countdown_tick: Duration,
    /// How often to poll the Pix payment status
    pub pix_poll_interval: Duration,
    /// Pix expiry used when the backend does not send one
    pub pix_default_expiry_secs: u64,
    /// Days between boleto generation and its due date
    pub boleto_due_days: u32,
    /// Idle time before an abandoned checkout is discarded
    pub idle_timeout: Duration,
    /// How often idle checkouts are actually dropped
    pub sweep_interval: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            countdown_tick: Duration::from_secs(1),
            pix_poll_interval: Duration::from_secs(15),
            pix_default_expiry_secs: 1800,
            boleto_due_days: 3,
            idle_timeout: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Merchant details shown on the payment and confirmation screens.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MerchantInfo {
    pub name: String,
    pub city: String,
    pub phone: String,
    pub email: String,
}

impl Default for MerchantInfo {
    fn default() -> Self {
        Self {
            name: "DANI&THUR AUTOMÓVEIS".to_string(),
            city: "SABARÁ/MG".to_string(),
            phone: "(31) 99999-9999".to_string(),
            email: "vendas@danithur.com.br".to_string(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");

        let api = BackendApiConfig::from_env()?;
        let postal = PostalLookupConfig::from_env()?;
        let checkout = CheckoutConfig::from_env()?;
        let merchant = MerchantInfo::from_env();

        Ok(Self {
            host,
            port,
            base_url,
            api,
            postal,
            checkout,
            merchant,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Configuration with every optional setting at its default.
    #[must_use]
    pub fn with_api_url(api_base_url: &str) -> Self {
        let timeout = Duration::from_secs(10);
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            api: BackendApiConfig {
                base_url: api_base_url.trim_end_matches('/').to_string(),
                api_token: None,
                timeout,
            },
            postal: PostalLookupConfig {
                base_url: "https://viacep.com.br/ws".to_string(),
                timeout,
            },
            checkout: CheckoutConfig::default(),
            merchant: MerchantInfo::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BackendApiConfig {
    /// Load the backend API section on its own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DANITHUR_API_URL` is missing or the token is weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_required_env("DANITHUR_API_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("DANITHUR_API_URL".to_string(), e.to_string())
        })?;

        let api_token = match get_optional_env("DANITHUR_API_TOKEN") {
            Some(_) => Some(get_validated_secret("DANITHUR_API_TOKEN")?),
            None => None,
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            timeout: get_http_timeout()?,
        })
    }
}

impl PostalLookupConfig {
    /// Load the postal lookup section on its own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `POSTAL_LOOKUP_URL` or the timeout is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_env_or_default("POSTAL_LOOKUP_URL", "https://viacep.com.br/ws");
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("POSTAL_LOOKUP_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: get_http_timeout()?,
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let poll_secs = parse_env_or_default::<u64>("PIX_POLL_INTERVAL_SECS", "15")?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PIX_POLL_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            countdown_tick: defaults.countdown_tick,
            pix_poll_interval: Duration::from_secs(poll_secs),
            pix_default_expiry_secs: parse_env_or_default("PIX_DEFAULT_EXPIRY_SECS", "1800")?,
            boleto_due_days: parse_env_or_default("BOLETO_DUE_DAYS", "3")?,
            idle_timeout: Duration::from_secs(parse_env_or_default(
                "CHECKOUT_IDLE_TIMEOUT_SECS",
                "3600",
            )?),
            sweep_interval: defaults.sweep_interval,
        })
    }
}

impl MerchantInfo {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: get_optional_env("MERCHANT_NAME").unwrap_or(defaults.name),
            city: get_optional_env("MERCHANT_CITY").unwrap_or(defaults.city),
            phone: get_optional_env("MERCHANT_PHONE").unwrap_or(defaults.phone),
            email: get_optional_env("MERCHANT_EMAIL").unwrap_or(defaults.email),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_http_timeout() -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_env_or_default(
        "HTTP_TIMEOUT_SECS",
        "10",
    )?))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
