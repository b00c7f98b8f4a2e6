//! Read-only analytics over committed profiles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::funnel::payment::PaymentIntentTracker;
use crate::funnel::types::{Profile, Stage};

/// Point-in-time funnel metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_conversations: usize,
    /// Conversations with a message on the snapshot's UTC day.
    pub active_today: usize,
    /// Confirmed payments.
    pub conversions: usize,
    /// Profiles that reached `Converted`.
    pub converted_profiles: usize,
    /// Payment links issued.
    pub attempted_offers: usize,
    pub awaiting_payment: usize,
    pub confirmed_revenue: Decimal,
    /// Confirmed payments per conversation, in percent.
    pub conversion_rate: f64,
    pub stage_breakdown: BTreeMap<String, usize>,
    pub computed_at: DateTime<Utc>,
}

impl AnalyticsSnapshot {
    /// Compute metrics over `profiles` as of `now`.
    pub fn compute(profiles: &[Profile], now: DateTime<Utc>) -> Self {
        let totals = PaymentIntentTracker::new().totals(profiles);
        let today = now.date_naive();

        let mut stage_breakdown = BTreeMap::new();
        for profile in profiles {
            *stage_breakdown
                .entry(profile.stage.to_string())
                .or_insert(0usize) += 1;
        }

        let active_today = profiles
            .iter()
            .filter(|p| p.last_interaction.is_some_and(|t| t.date_naive() == today))
            .count();
        let converted_profiles = profiles
            .iter()
            .filter(|p| p.stage == Stage::Converted)
            .count();

        let total_conversations = profiles.len();
        let conversion_rate = if total_conversations > 0 {
            totals.confirmed as f64 / total_conversations as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_conversations,
            active_today,
            conversions: totals.confirmed,
            converted_profiles,
            attempted_offers: totals.issued,
            awaiting_payment: totals.awaiting,
            confirmed_revenue: totals.confirmed_revenue,
            conversion_rate,
            stage_breakdown,
            computed_at: now,
        }
    }

    /// Conversion rate formatted like `12.5%`.
    pub fn conversion_rate_label(&self) -> String {
        format!("{:.1}%", self.conversion_rate)
    }
}
