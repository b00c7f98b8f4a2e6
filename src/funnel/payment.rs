//! Payment-intent tracking.
//!
//! The current cycle's record lives on the [`Profile`] itself, so issuing a
//! link and committing the profile are one write. A cycle runs from the first
//! issued link until [`PaymentIntentTracker::reset`]; within a cycle `issue`
//! is idempotent.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::funnel::product::Product;
use crate::funnel::types::{PaymentIntentRecord, PaymentStatus, Profile, Tier};

/// Aggregate counts over a set of profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentTotals {
    /// Links issued, current and archived cycles.
    pub issued: usize,
    pub awaiting: usize,
    pub confirmed: usize,
    /// Sum of confirmed amounts (falls back to quoted price).
    pub confirmed_revenue: Decimal,
}

/// Issues, confirms and resets payment intents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentIntentTracker;

impl PaymentIntentTracker {
    pub fn new() -> Self {
        Self
    }

    /// Record an offer link for this cycle.
    ///
    /// Returns `false` and changes nothing if a link was already issued.
    pub fn issue(&self, profile: &mut Profile, product: &Product, now: DateTime<Utc>) -> bool {
        if profile.link_sent {
            return false;
        }

        let record = PaymentIntentRecord {
            id: Uuid::new_v4(),
            profile_id: profile.id.clone(),
            tier: product.tier,
            price: product.price,
            issued_at: now,
            status: PaymentStatus::Awaiting,
            confirmed_at: None,
            confirmed_amount: None,
        };

        info!(
            conversation_id = %profile.id,
            tier = %product.tier,
            price = %product.price,
            "Payment link issued"
        );

        profile.payment_intent = Some(record);
        profile.package_interested = Some(product.tier);
        profile.link_sent = true;
        profile.awaiting_payment = true;
        true
    }

    /// Mark the current cycle's intent as paid.
    ///
    /// Advisory only: the stage is left to the transition engine.
    pub fn confirm(
        &self,
        profile: &mut Profile,
        tier: Tier,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PaymentIntentRecord, PaymentError> {
        let conversation_id = profile.id.clone();
        let record = profile
            .payment_intent
            .as_mut()
            .ok_or_else(|| PaymentError::NoOpenIntent {
                conversation_id: conversation_id.clone(),
            })?;

        if record.status == PaymentStatus::Confirmed {
            return Err(PaymentError::AlreadyConfirmed { conversation_id });
        }
        if record.tier != tier {
            return Err(PaymentError::TierMismatch {
                conversation_id,
                issued: record.tier,
                confirmed: tier,
            });
        }
        if amount != record.price {
            warn!(
                conversation_id = %conversation_id,
                quoted = %record.price,
                paid = %amount,
                "Confirmed amount differs from quoted price"
            );
        }

        record.status = PaymentStatus::Confirmed;
        record.confirmed_at = Some(now);
        record.confirmed_amount = Some(amount);
        let confirmed = record.clone();
        profile.awaiting_payment = false;

        info!(
            conversation_id = %conversation_id,
            tier = %tier,
            amount = %amount,
            "Payment confirmed"
        );

        Ok(confirmed)
    }

    /// Close the current cycle so a new link may be issued.
    ///
    /// Returns the archived record, if there was one.
    pub fn reset(&self, profile: &mut Profile) -> Option<PaymentIntentRecord> {
        profile.link_sent = false;
        profile.awaiting_payment = false;
        let archived = profile.payment_intent.take()?;
        profile.payment_history.push(archived.clone());
        Some(archived)
    }

    /// Aggregate counts over current and archived intents.
    pub fn totals<'a>(&self, profiles: impl IntoIterator<Item = &'a Profile>) -> PaymentTotals {
        let mut totals = PaymentTotals::default();
        let records = profiles
            .into_iter()
            .flat_map(|p| p.payment_intent.iter().chain(p.payment_history.iter()));

        for record in records {
            totals.issued += 1;
            match record.status {
                PaymentStatus::Awaiting => totals.awaiting += 1,
                PaymentStatus::Confirmed => {
                    totals.confirmed += 1;
                    totals.confirmed_revenue += record.confirmed_amount.unwrap_or(record.price);
                }
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::product::ProductCatalog;
    use rust_decimal_macros::dec;

    fn vip() -> Product {
        ProductCatalog::default().vip
    }

    #[test]
    fn issue_records_awaiting_intent() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");

        assert!(tracker.issue(&mut profile, &vip(), Utc::now()));
        assert!(profile.link_sent);
        assert!(profile.awaiting_payment);
        assert_eq!(profile.package_interested, Some(Tier::Vip));

        let record = profile.payment_intent.as_ref().unwrap();
        assert_eq!(record.status, PaymentStatus::Awaiting);
        assert_eq!(record.profile_id, "p1");
        assert_eq!(record.price, dec!(69.90));
    }

    #[test]
    fn second_issue_in_cycle_is_a_noop() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");
        assert!(tracker.issue(&mut profile, &vip(), Utc::now()));
        let snapshot = profile.clone();

        let basic = ProductCatalog::default().basic;
        assert!(!tracker.issue(&mut profile, &basic, Utc::now()));
        assert_eq!(profile, snapshot);
    }

    #[test]
    fn confirm_clears_awaiting_but_keeps_link_sent() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");
        tracker.issue(&mut profile, &vip(), Utc::now());

        let record = tracker
            .confirm(&mut profile, Tier::Vip, dec!(69.90), Utc::now())
            .unwrap();
        assert_eq!(record.status, PaymentStatus::Confirmed);
        assert!(!profile.awaiting_payment);
        assert!(profile.link_sent);
        assert!(profile.has_confirmed_payment());
    }

    #[test]
    fn confirm_without_intent_fails() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");
        let err = tracker
            .confirm(&mut profile, Tier::Basic, dec!(19.90), Utc::now())
            .unwrap_err();
        assert!(matches!(err, PaymentError::NoOpenIntent { .. }));
    }

    #[test]
    fn confirm_twice_fails() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");
        tracker.issue(&mut profile, &vip(), Utc::now());
        tracker
            .confirm(&mut profile, Tier::Vip, dec!(69.90), Utc::now())
            .unwrap();
        let err = tracker
            .confirm(&mut profile, Tier::Vip, dec!(69.90), Utc::now())
            .unwrap_err();
        assert!(matches!(err, PaymentError::AlreadyConfirmed { .. }));
    }

    #[test]
    fn confirm_rejects_other_tier() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");
        tracker.issue(&mut profile, &vip(), Utc::now());
        let err = tracker
            .confirm(&mut profile, Tier::Basic, dec!(19.90), Utc::now())
            .unwrap_err();
        assert!(matches!(err, PaymentError::TierMismatch { .. }));
        assert!(profile.awaiting_payment);
    }

    #[test]
    fn reset_opens_a_new_cycle() {
        let tracker = PaymentIntentTracker::new();
        let mut profile = Profile::new("p1");
        tracker.issue(&mut profile, &vip(), Utc::now());

        let archived = tracker.reset(&mut profile).unwrap();
        assert_eq!(archived.tier, Tier::Vip);
        assert!(!profile.link_sent);
        assert!(profile.payment_intent.is_none());
        assert_eq!(profile.payment_history.len(), 1);

        assert!(tracker.issue(&mut profile, &vip(), Utc::now()));
    }

    #[test]
    fn totals_cover_current_and_archived_cycles() {
        let tracker = PaymentIntentTracker::new();
        let mut paid = Profile::new("paid");
        tracker.issue(&mut paid, &vip(), Utc::now());
        tracker
            .confirm(&mut paid, Tier::Vip, dec!(70.00), Utc::now())
            .unwrap();
        tracker.reset(&mut paid);
        tracker.issue(&mut paid, &ProductCatalog::default().basic, Utc::now());

        let mut waiting = Profile::new("waiting");
        tracker.issue(&mut waiting, &vip(), Utc::now());

        let idle = Profile::new("idle");

        let totals = tracker.totals([&paid, &waiting, &idle]);
        assert_eq!(totals.issued, 3);
        assert_eq!(totals.awaiting, 2);
        assert_eq!(totals.confirmed, 1);
        assert_eq!(totals.confirmed_revenue, dec!(70.00));
    }
}
