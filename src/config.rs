//! Configuration types.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ConfigError;
use crate::funnel::product::ProductCatalog;
use crate::funnel::scoring::ScoreWeights;
use crate::funnel::stage::StageThresholds;
use crate::funnel::types::Tier;

/// Funnel configuration.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// Offers per tier.
    pub catalog: ProductCatalog,
    /// Score deltas.
    pub weights: ScoreWeights,
    /// Transition gates.
    pub thresholds: StageThresholds,
    /// Seed for reproducible template choice; `None` uses entropy.
    pub template_seed: Option<u64>,
    /// Number of recent gateway message ids remembered for de-duplication.
    pub dedup_capacity: usize,
    /// Score above which a conversation is logged as likely to convert.
    pub high_propensity_threshold: f64,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            catalog: ProductCatalog::default(),
            weights: ScoreWeights::default(),
            thresholds: StageThresholds::default(),
            template_seed: None,
            dedup_capacity: 10_000,
            high_propensity_threshold: 0.7,
        }
    }
}

impl FunnelConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// - `FUNNEL_LINK_{BASIC,PREMIUM,VIP}`: payment links
    /// - `FUNNEL_PRICE_{BASIC,PREMIUM,VIP}`: decimal prices
    /// - `FUNNEL_TEMPLATE_SEED`: u64 seed for template choice
    /// - `FUNNEL_DEDUP_CAPACITY`: message-id window size
    /// - `FUNNEL_HIGH_PROPENSITY`: score in `[0, 1]`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for tier in [Tier::Basic, Tier::Premium, Tier::Vip] {
            let suffix = tier.as_str().to_uppercase();
            let product = config.catalog.get_mut(tier);

            if let Some(link) = lookup(&format!("FUNNEL_LINK_{suffix}")) {
                let link = link.trim();
                if !link.is_empty() {
                    product.payment_link = link.to_string();
                }
            }

            let price_key = format!("FUNNEL_PRICE_{suffix}");
            if let Some(price) = parse_var::<Decimal>(&lookup, &price_key)? {
                if price <= Decimal::ZERO {
                    return Err(ConfigError::InvalidValue {
                        key: price_key,
                        message: "price must be positive".into(),
                    });
                }
                product.price = price;
            }
        }

        config.template_seed = parse_var(&lookup, "FUNNEL_TEMPLATE_SEED")?;

        if let Some(capacity) = parse_var(&lookup, "FUNNEL_DEDUP_CAPACITY")? {
            config.dedup_capacity = capacity;
        }

        if let Some(threshold) = parse_var::<f64>(&lookup, "FUNNEL_HIGH_PROPENSITY")? {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue {
                    key: "FUNNEL_HIGH_PROPENSITY".into(),
                    message: format!("{threshold} is outside [0, 1]"),
                });
            }
            config.high_propensity_threshold = threshold;
        }

        Ok(config)
    }
}

/// Parse an optional variable; unset or blank is `None`.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        _ => Ok(None),
    }
}
