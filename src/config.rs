use crate::error::{MarketError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which provider deployment the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => "https://sandbox.safaricom.co.ke",
            MpesaEnvironment::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(MpesaEnvironment::Sandbox),
            "production" => Ok(MpesaEnvironment::Production),
            other => Err(MarketError::ConfigError(format!(
                "Invalid MPESA_ENVIRONMENT '{}': expected 'sandbox' or 'production'",
                other
            ))),
        }
    }
}

/// What a failed or cancelled payment callback does to its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackFailurePolicy {
    /// Leave the order where it is so the buyer can retry payment.
    #[default]
    KeepStatus,
    Reject,
}

impl FromStr for CallbackFailurePolicy {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" | "keep-status" => Ok(CallbackFailurePolicy::KeepStatus),
            "reject" => Ok(CallbackFailurePolicy::Reject),
            other => Err(MarketError::ConfigError(format!(
                "Invalid MARKET_CALLBACK_FAILURE_POLICY '{}': expected 'keep' or 'reject'",
                other
            ))),
        }
    }
}

/// How checkout treats listing stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
    /// Decrement stock in the same commit as the order; rejected orders
    /// give it back.
    #[default]
    Reserve,
    /// Only compare against current stock. Concurrent checkouts can oversell.
    CheckOnly,
}

impl FromStr for StockPolicy {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reserve" => Ok(StockPolicy::Reserve),
            "check-only" | "check_only" => Ok(StockPolicy::CheckOnly),
            other => Err(MarketError::ConfigError(format!(
                "Invalid MARKET_STOCK_POLICY '{}': expected 'reserve' or 'check-only'",
                other
            ))),
        }
    }
}

/// Which price an order total is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricingPolicy {
    /// The unit price captured on each line when the order was placed.
    #[default]
    Snapshot,
    /// The listing's current price; later price edits change old totals.
    Live,
}

impl FromStr for PricingPolicy {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(PricingPolicy::Snapshot),
            "live" => Ok(PricingPolicy::Live),
            other => Err(MarketError::ConfigError(format!(
                "Invalid MARKET_PRICING_POLICY '{}': expected 'snapshot' or 'live'",
                other
            ))),
        }
    }
}

/// Order engine behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub stock_policy: StockPolicy,
    pub pricing_policy: PricingPolicy,
    pub callback_failure_policy: CallbackFailurePolicy,
}

#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub shortcode: Option<String>,
    pub passkey: Option<String>,
    pub callback_url: Option<String>,
    /// Kept below the provider's one hour token lifetime.
    pub token_ttl: Duration,
    pub http_timeout: Duration,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            environment: MpesaEnvironment::Sandbox,
            consumer_key: None,
            consumer_secret: None,
            shortcode: None,
            passkey: None,
            callback_url: None,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3500;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const PROVIDER_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Clone, Default)]
pub struct MarketConfig {
    pub engine: EngineConfig,
    pub mpesa: MpesaConfig,
}

impl MarketConfig {
    /// Loads configuration from the process environment, reading a `.env`
    /// file first when one is present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|name| env::var(name).ok())?;
        tracing::info!(
            environment = ?config.mpesa.environment,
            stock_policy = ?config.engine.stock_policy,
            pricing_policy = ?config.engine.pricing_policy,
            "Marketplace configuration loaded"
        );
        Ok(config)
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let parse = |name: &str, default: u64| -> Result<u64> {
            match get(name) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                    MarketError::ConfigError(format!("Invalid {}: {}", name, e))
                }),
                None => Ok(default),
            }
        };

        let token_ttl_secs = parse("MPESA_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if token_ttl_secs == 0 || token_ttl_secs >= PROVIDER_TOKEN_LIFETIME_SECS {
            return Err(MarketError::ConfigError(format!(
                "MPESA_TOKEN_TTL_SECS must be between 1 and {}",
                PROVIDER_TOKEN_LIFETIME_SECS - 1
            )));
        }
        let http_timeout_secs = parse("MPESA_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        let mpesa = MpesaConfig {
            environment: get("MPESA_ENVIRONMENT")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(MpesaEnvironment::Sandbox),
            consumer_key: get("MPESA_CONSUMER_KEY"),
            consumer_secret: get("MPESA_CONSUMER_SECRET"),
            shortcode: get("MPESA_SHORTCODE"),
            passkey: get("MPESA_PASSKEY"),
            callback_url: get("MPESA_CALLBACK_URL"),
            token_ttl: Duration::from_secs(token_ttl_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
        };

        let engine = EngineConfig {
            stock_policy: get("MARKET_STOCK_POLICY")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            pricing_policy: get("MARKET_PRICING_POLICY")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            callback_failure_policy: get("MARKET_CALLBACK_FAILURE_POLICY")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
        };

        Ok(Self { engine, mpesa })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MarketConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mpesa.environment, MpesaEnvironment::Sandbox);
        assert_eq!(config.mpesa.token_ttl, Duration::from_secs(3500));
        assert_eq!(config.mpesa.http_timeout, Duration::from_secs(10));
        assert_eq!(config.engine.stock_policy, StockPolicy::Reserve);
        assert_eq!(config.engine.pricing_policy, PricingPolicy::Snapshot);
        assert_eq!(
            config.engine.callback_failure_policy,
            CallbackFailurePolicy::KeepStatus
        );
        assert!(config.mpesa.consumer_key.is_none());
    }

    #[test]
    fn test_production_selects_live_base_url() {
        let config = MarketConfig::from_lookup(lookup(&[
            ("MPESA_ENVIRONMENT", "production"),
            ("MPESA_CONSUMER_KEY", "key"),
            ("MARKET_CALLBACK_FAILURE_POLICY", "reject"),
            ("MARKET_STOCK_POLICY", "check-only"),
            ("MARKET_PRICING_POLICY", "live"),
        ]))
        .unwrap();
        assert_eq!(
            config.mpesa.environment.base_url(),
            "https://api.safaricom.co.ke"
        );
        assert_eq!(config.mpesa.consumer_key.as_deref(), Some("key"));
        assert_eq!(
            config.engine.callback_failure_policy,
            CallbackFailurePolicy::Reject
        );
        assert_eq!(config.engine.stock_policy, StockPolicy::CheckOnly);
        assert_eq!(config.engine.pricing_policy, PricingPolicy::Live);
    }

    #[test]
    fn test_token_ttl_must_undercut_provider_lifetime() {
        let result = MarketConfig::from_lookup(lookup(&[("MPESA_TOKEN_TTL_SECS", "3600")]));
        assert!(matches!(result, Err(MarketError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_environment_is_reported() {
        let result = MarketConfig::from_lookup(lookup(&[("MPESA_ENVIRONMENT", "staging")]));
        assert!(matches!(result, Err(MarketError::ConfigError(_))));
    }
}
