//! Configuration management for the booking runtime.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Gateway secrets have no defaults: when they are missing the gateway is
//! reported as misconfigured and no payment call is ever made.

use crate::retry::RetryPolicy;
use booking_core::Money;
use booking_core::pricing::PricingContext;
use booking_core::reconciliation::ReconciliationConfig;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Shortest allowed collaborator call timeout.
pub const MIN_CALL_TIMEOUT: Duration = Duration::from_secs(1);
/// Longest allowed collaborator call timeout.
pub const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration problems found by [`Config::from_env`] or [`Config::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable is set but cannot be parsed
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        /// Environment variable
        name: &'static str,
        /// Raw value
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// Value parsed but is outside its allowed range
    #[error("{name} is out of range: {reason}")]
    OutOfRange {
        /// Setting
        name: &'static str,
        /// Allowed range
        reason: String,
    },

    /// Required gateway setting is missing or malformed
    #[error("Payment gateway is not configured: {0}")]
    Gateway(String),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Payment gateway settings
    pub gateway: GatewayConfig,
    /// Checkout pricing and call settings
    pub checkout: CheckoutConfig,
    /// Booking-to-slot reconciliation settings
    pub reconciliation: ReconciliationConfig,
    /// Payment status polling
    pub polling: PollingConfig,
    /// Retries of catalog reads during checkout
    pub catalog: CatalogConfig,
}

/// Payment gateway settings.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Merchant id issued by the gateway
    pub merchant_id: String,
    /// Salt key used for the integrity token
    pub salt_key: String,
    /// Index of the salt key
    pub salt_index: String,
    /// Base URL the gateway redirects and calls back to
    pub callback_base_url: String,
    /// Gateway API base URL
    pub base_url: String,
    /// Transaction id prefix
    pub transaction_prefix: String,
    /// Longest transaction id the gateway accepts
    pub max_transaction_id_len: usize,
    /// Settled (successful) attempts kept in the adapter's registry, oldest evicted first
    pub settled_attempt_capacity: usize,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("merchant_id", &self.merchant_id)
            .field("salt_key", &"<redacted>")
            .field("salt_index", &self.salt_index)
            .field("callback_base_url", &self.callback_base_url)
            .field("base_url", &self.base_url)
            .field("transaction_prefix", &self.transaction_prefix)
            .field("max_transaction_id_len", &self.max_transaction_id_len)
            .field("settled_attempt_capacity", &self.settled_attempt_capacity)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            merchant_id: String::new(),
            salt_key: String::new(),
            salt_index: String::new(),
            callback_base_url: String::new(),
            base_url: "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string(),
            transaction_prefix: "NIBOG".to_string(),
            max_transaction_id_len: 38,
            settled_attempt_capacity: 1024,
        }
    }
}

impl GatewayConfig {
    /// Checks that every setting a payment needs is present and well formed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Gateway`] naming the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merchant_id.trim().is_empty() {
            return Err(ConfigError::Gateway("merchant id is missing".to_string()));
        }
        if self.salt_key.trim().is_empty() {
            return Err(ConfigError::Gateway("salt key is missing".to_string()));
        }
        if self.salt_index.trim().is_empty() || !self.salt_index.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Gateway("salt index must be a number".to_string()));
        }
        for (name, url) in [
            ("callback base URL", &self.callback_base_url),
            ("gateway base URL", &self.base_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Gateway(format!("{name} must be an http(s) URL")));
            }
        }
        if self.transaction_prefix.is_empty()
            || !self.transaction_prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Gateway(
                "transaction prefix must be alphanumeric".to_string(),
            ));
        }
        Ok(())
    }
}

/// Checkout pricing and collaborator call settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckoutConfig {
    /// Tax rate applied after the promo discount (0.18 = 18%)
    pub tax_rate: f64,
    /// Timeout of every collaborator call
    pub call_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.0,
            call_timeout: Duration::from_secs(15),
        }
    }
}

impl CheckoutConfig {
    /// Pricing parameters for the checkout reducer.
    #[must_use]
    pub const fn pricing(&self) -> PricingContext {
        PricingContext {
            tax_rate: self.tax_rate,
        }
    }
}

/// Payment status polling after the user returns from the gateway.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Backoff between polls; `max_attempts` bounds the number of polls
    pub policy: RetryPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::new()
                .with_max_attempts(5)
                .with_initial_delay(Duration::from_secs(2))
                .with_max_delay(Duration::from_secs(20)),
        }
    }
}

/// Retries of catalog reads (cities, events, games, add-ons) before the
/// session shows a "try again" notice.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Backoff between reads; only retryable errors are retried
    pub retry: RetryPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new()
                .with_max_attempts(3)
                .with_initial_delay(Duration::from_millis(250))
                .with_max_delay(Duration::from_secs(2)),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `PAYMENT_MERCHANT_ID`, `PAYMENT_SALT_KEY`, `PAYMENT_SALT_INDEX`, `PAYMENT_CALLBACK_BASE_URL` | none |
    /// | `PAYMENT_GATEWAY_BASE_URL` | gateway sandbox |
    /// | `PAYMENT_TXN_PREFIX` | `NIBOG` |
    /// | `PAYMENT_TXN_MAX_LEN` | 38 |
    /// | `BOOKING_TAX_RATE` | 0 |
    /// | `BOOKING_CALL_TIMEOUT_SECS` | 15 |
    /// | `RECONCILE_PRICE_TOLERANCE` | 2.00 |
    /// | `RECONCILE_WINDOW_HOURS` | 24 |
    /// | `PAYMENT_POLL_ATTEMPTS` | 5 |
    /// | `PAYMENT_POLL_INITIAL_DELAY_MS` | 2000 |
    /// | `PAYMENT_SETTLED_RETENTION` | 1024 |
    /// | `CATALOG_RETRY_ATTEMPTS` | 3 |
    /// | `CATALOG_RETRY_INITIAL_DELAY_MS` | 250 |
    ///
    /// Missing gateway secrets are not an error here; [`GatewayConfig::validate`]
    /// reports them before any payment is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparsable or
    /// out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_defaults = GatewayConfig::default();
        let gateway = GatewayConfig {
            merchant_id: env::var("PAYMENT_MERCHANT_ID").unwrap_or_default(),
            salt_key: env::var("PAYMENT_SALT_KEY").unwrap_or_default(),
            salt_index: env::var("PAYMENT_SALT_INDEX").unwrap_or_default(),
            callback_base_url: env::var("PAYMENT_CALLBACK_BASE_URL").unwrap_or_default(),
            base_url: env::var("PAYMENT_GATEWAY_BASE_URL").unwrap_or(gateway_defaults.base_url),
            transaction_prefix: env::var("PAYMENT_TXN_PREFIX")
                .unwrap_or(gateway_defaults.transaction_prefix),
            max_transaction_id_len: parse_var("PAYMENT_TXN_MAX_LEN")?
                .unwrap_or(gateway_defaults.max_transaction_id_len),
            settled_attempt_capacity: parse_var("PAYMENT_SETTLED_RETENTION")?
                .unwrap_or(gateway_defaults.settled_attempt_capacity),
        };

        let checkout = CheckoutConfig {
            tax_rate: parse_var("BOOKING_TAX_RATE")?.unwrap_or(0.0),
            call_timeout: Duration::from_secs(parse_var("BOOKING_CALL_TIMEOUT_SECS")?.unwrap_or(15)),
        };

        let reconcile_defaults = ReconciliationConfig::default();
        let price_tolerance = match parse_var::<f64>("RECONCILE_PRICE_TOLERANCE")? {
            Some(raw) => Money::from_major(raw).ok_or_else(|| ConfigError::Invalid {
                name: "RECONCILE_PRICE_TOLERANCE",
                value: raw.to_string(),
                reason: "not a finite amount".to_string(),
            })?,
            None => reconcile_defaults.price_tolerance,
        };
        let reconciliation = ReconciliationConfig {
            price_tolerance,
            temporal_window: parse_var::<i64>("RECONCILE_WINDOW_HOURS")?
                .map_or(reconcile_defaults.temporal_window, chrono::Duration::hours),
        };

        let polling_defaults = PollingConfig::default();
        let mut policy = polling_defaults.policy;
        if let Some(attempts) = parse_var("PAYMENT_POLL_ATTEMPTS")? {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(millis) = parse_var("PAYMENT_POLL_INITIAL_DELAY_MS")? {
            policy = policy.with_initial_delay(Duration::from_millis(millis));
        }

        let mut catalog = CatalogConfig::default();
        if let Some(attempts) = parse_var("CATALOG_RETRY_ATTEMPTS")? {
            catalog.retry = catalog.retry.with_max_attempts(attempts);
        }
        if let Some(millis) = parse_var("CATALOG_RETRY_INITIAL_DELAY_MS")? {
            catalog.retry = catalog.retry.with_initial_delay(Duration::from_millis(millis));
        }

        let config = Self {
            gateway,
            checkout,
            reconciliation,
            polling: PollingConfig { policy },
            catalog,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges of the non-secret settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first setting outside its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = self.checkout.call_timeout;
        if !(MIN_CALL_TIMEOUT..=MAX_CALL_TIMEOUT).contains(&timeout) {
            return Err(ConfigError::OutOfRange {
                name: "BOOKING_CALL_TIMEOUT_SECS",
                reason: format!(
                    "{}s is outside {}..={}s",
                    timeout.as_secs(),
                    MIN_CALL_TIMEOUT.as_secs(),
                    MAX_CALL_TIMEOUT.as_secs()
                ),
            });
        }
        if !self.checkout.tax_rate.is_finite() || !(0.0..1.0).contains(&self.checkout.tax_rate) {
            return Err(ConfigError::OutOfRange {
                name: "BOOKING_TAX_RATE",
                reason: "must be a fraction in 0..1".to_string(),
            });
        }
        if self.gateway.max_transaction_id_len == 0 {
            return Err(ConfigError::OutOfRange {
                name: "PAYMENT_TXN_MAX_LEN",
                reason: "must be positive".to_string(),
            });
        }
        if self.reconciliation.price_tolerance.minor() < 0 {
            return Err(ConfigError::OutOfRange {
                name: "RECONCILE_PRICE_TOLERANCE",
                reason: "must not be negative".to_string(),
            });
        }
        if self.reconciliation.temporal_window <= chrono::Duration::zero() {
            return Err(ConfigError::OutOfRange {
                name: "RECONCILE_WINDOW_HOURS",
                reason: "must be positive".to_string(),
            });
        }
        if self.polling.policy.max_attempts() == 0 {
            return Err(ConfigError::OutOfRange {
                name: "PAYMENT_POLL_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.catalog.retry.max_attempts() == 0 {
            return Err(ConfigError::OutOfRange {
                name: "CATALOG_RETRY_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.gateway.settled_attempt_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                name: "PAYMENT_SETTLED_RETENTION",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            checkout: CheckoutConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            polling: PollingConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}
