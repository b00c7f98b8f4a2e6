//! Shared types for the funnel: stages, tiers, intents, profiles, payment intents.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Stage ───────────────────────────────────────────────────────────

/// Discrete phase of the sales funnel.
///
/// Persisted as a lowercase string. Values that don't name a known stage
/// deserialize into [`Stage::Unknown`] instead of failing, so a corrupted row
/// still loads and gets the fallback reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    Initial,
    Qualification,
    Interest,
    Objections,
    Closing,
    Converted,
    /// Unrecognized persisted value, kept verbatim.
    Unknown(String),
}

impl Stage {
    /// Whether this stage is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted)
    }

    /// Stable string form (matches serde).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initial => "initial",
            Self::Qualification => "qualification",
            Self::Interest => "interest",
            Self::Objections => "objections",
            Self::Closing => "closing",
            Self::Converted => "converted",
            Self::Unknown(raw) => raw,
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::Initial
    }
}

impl From<&str> for Stage {
    fn from(s: &str) -> Self {
        match s {
            "initial" => Self::Initial,
            "qualification" => Self::Qualification,
            "interest" => Self::Interest,
            "objections" => Self::Objections,
            "closing" => Self::Closing,
            "converted" => Self::Converted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Stage {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Tier ────────────────────────────────────────────────────────────

/// A priced offer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Premium,
    Vip,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Vip => "vip",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Intent ──────────────────────────────────────────────────────────

/// Signals extracted from a single inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Intent {
    pub greeting: bool,
    pub price_question: bool,
    pub meeting_interest: bool,
    pub trust_concern: bool,
    pub positive_signal: bool,
    pub compliment: bool,
    pub availability: bool,
    pub location_mention: bool,
    /// Asks about age. Informational only; never scored.
    pub age_question: bool,
    /// Asks where/how far. Informational only; never scored.
    pub location_question: bool,
    /// Weighted sum of the positive flags.
    pub interest_level: u32,
    /// First recognized place name, lowercase as matched.
    pub location: Option<String>,
}

impl Intent {
    /// True when no flag fired.
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

// ── Payment intent ──────────────────────────────────────────────────

/// Status of an issued payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Link sent, payment not yet confirmed.
    Awaiting,
    /// Payment provider confirmed the payment.
    Confirmed,
}

/// Record that an offer link was issued to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentRecord {
    pub id: Uuid,
    pub profile_id: String,
    pub tier: Tier,
    /// Price quoted when the link was issued.
    pub price: Decimal,
    pub issued_at: DateTime<Utc>,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_amount: Option<Decimal>,
}

// ── Profile ─────────────────────────────────────────────────────────

/// Funnel state for one conversation identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub stage: Stage,
    /// Propensity to convert, always within `[0, 1]`.
    pub score: f64,
    pub message_count: u64,
    /// Turns answered while in `Closing`.
    #[serde(default)]
    pub closing_turns: u64,
    /// Set once, title-cased.
    pub location: Option<String>,
    /// Tier of the last offer presented.
    pub package_interested: Option<Tier>,
    pub link_sent: bool,
    pub awaiting_payment: bool,
    pub last_interaction: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Payment intent for the current commercial cycle.
    #[serde(default)]
    pub payment_intent: Option<PaymentIntentRecord>,
    /// Intents from cycles closed by a reset.
    #[serde(default)]
    pub payment_history: Vec<PaymentIntentRecord>,
}

impl Profile {
    /// Fresh profile at the start of the funnel.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stage: Stage::Initial,
            score: 0.0,
            message_count: 0,
            closing_turns: 0,
            location: None,
            package_interested: None,
            link_sent: false,
            awaiting_payment: false,
            last_interaction: None,
            created_at: Utc::now(),
            payment_intent: None,
            payment_history: Vec::new(),
        }
    }

    /// Whether a payment has been confirmed in the current cycle.
    pub fn has_confirmed_payment(&self) -> bool {
        self.payment_intent
            .as_ref()
            .is_some_and(|r| r.status == PaymentStatus::Confirmed)
    }
}
