//! Offer tiers and the score-based selector.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::funnel::types::{Profile, Tier};

/// Score above which the top tier is offered.
const VIP_SCORE: f64 = 0.8;
/// Score above which the mid tier is offered.
const PREMIUM_SCORE: f64 = 0.6;

/// Price, description and payment link for one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub tier: Tier,
    pub price: Decimal,
    pub description: String,
    pub payment_link: String,
}

impl Product {
    /// Price formatted for a message, e.g. `€19.90`.
    pub fn price_label(&self) -> String {
        format!("€{:.2}", self.price)
    }
}

/// The three offers, one per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub basic: Product,
    pub premium: Product,
    pub vip: Product,
}

impl ProductCatalog {
    pub fn get(&self, tier: Tier) -> &Product {
        match tier {
            Tier::Basic => &self.basic,
            Tier::Premium => &self.premium,
            Tier::Vip => &self.vip,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut Product {
        match tier {
            Tier::Basic => &mut self.basic,
            Tier::Premium => &mut self.premium,
            Tier::Vip => &mut self.vip,
        }
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self {
            basic: Product {
                tier: Tier::Basic,
                price: dec!(19.90),
                description: "Pacote básico".into(),
                payment_link: "https://pay.example.com/basic".into(),
            },
            premium: Product {
                tier: Tier::Premium,
                price: dec!(39.90),
                description: "Pacote premium".into(),
                payment_link: "https://pay.example.com/premium".into(),
            },
            vip: Product {
                tier: Tier::Vip,
                price: dec!(69.90),
                description: "Pacote VIP".into(),
                payment_link: "https://pay.example.com/vip".into(),
            },
        }
    }
}

/// Maps a profile to the tier it should be offered.
#[derive(Debug, Clone, Default)]
pub struct ProductSelector {
    catalog: ProductCatalog,
}

impl ProductSelector {
    pub fn new(catalog: ProductCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Tier for the profile's current score.
    pub fn select_tier(&self, profile: &Profile) -> Tier {
        tier_for_score(profile.score)
    }

    /// Full offer for the profile's current score.
    pub fn select(&self, profile: &Profile) -> &Product {
        self.catalog.get(self.select_tier(profile))
    }
}

/// `> 0.8` → Vip, `(0.6, 0.8]` → Premium, otherwise Basic.
pub fn tier_for_score(score: f64) -> Tier {
    if score > VIP_SCORE {
        Tier::Vip
    } else if score > PREMIUM_SCORE {
        Tier::Premium
    } else {
        Tier::Basic
    }
}
