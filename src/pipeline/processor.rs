//! Funnel processor: runs inbound events through the engine and delivers replies.
//!
//! **Core invariant: commit before deliver.** The profile for a turn is
//! written to the repository before the sink sees any message, so a delivery
//! failure never leaves funnel state out of step with what was decided.
//!
//! Flow per event:
//! 1. Message-id de-duplication (at-least-once gateways)
//! 2. Per-conversation lock (one in-flight message per id)
//! 3. Load or create profile → `FunnelEngine::process()` → commit
//! 4. Deliver outbound messages through the `MessageSink`

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::analytics::AnalyticsSnapshot;
use crate::config::FunnelConfig;
use crate::error::{RepositoryError, Result};
use crate::funnel::engine::{FunnelEngine, Turn};
use crate::funnel::payment::PaymentIntentTracker;
use crate::funnel::templates::{RandomSelector, TemplateSelector};
use crate::funnel::types::{PaymentIntentRecord, Profile};
use crate::pipeline::dedup::DedupWindow;
use crate::pipeline::types::{InboundEvent, MessageSink, PaymentConfirmation, ProcessOutcome};
use crate::store::ProfileRepository;

/// Default number of message ids remembered.
const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// Default score above which a conversation is flagged as likely to convert.
const DEFAULT_HIGH_PROPENSITY: f64 = 0.7;

type LockMap = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Exclusive hold on one conversation id.
///
/// The map entry is removed when the last holder or waiter lets go.
struct ConversationLease<'a> {
    locks: &'a LockMap,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

/// Orchestrates the funnel engine around storage and delivery.
pub struct FunnelProcessor {
    engine: Arc<FunnelEngine>,
    repo: Arc<dyn ProfileRepository>,
    sink: Arc<dyn MessageSink>,
    payments: PaymentIntentTracker,
    conversation_locks: LockMap,
    dedup: Mutex<DedupWindow>,
    high_propensity_threshold: f64,
}

impl FunnelProcessor {
    /// Create a processor with default de-duplication and logging thresholds.
    pub fn new(
        engine: Arc<FunnelEngine>,
        repo: Arc<dyn ProfileRepository>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            engine,
            repo,
            sink,
            payments: PaymentIntentTracker::new(),
            conversation_locks: StdMutex::new(HashMap::new()),
            dedup: Mutex::new(DedupWindow::new(DEFAULT_DEDUP_CAPACITY)),
            high_propensity_threshold: DEFAULT_HIGH_PROPENSITY,
        }
    }

    /// Build engine and processor from configuration.
    pub fn from_config(
        config: &FunnelConfig,
        repo: Arc<dyn ProfileRepository>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let templates: Arc<dyn TemplateSelector> = match config.template_seed {
            Some(seed) => Arc::new(RandomSelector::seeded(seed)),
            None => Arc::new(RandomSelector::new()),
        };
        let engine = FunnelEngine::builder()
            .templates(templates)
            .catalog(config.catalog.clone())
            .weights(config.weights)
            .thresholds(config.thresholds)
            .build();

        Self::new(Arc::new(engine), repo, sink)
            .with_dedup_capacity(config.dedup_capacity)
            .with_high_propensity_threshold(config.high_propensity_threshold)
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup = Mutex::new(DedupWindow::new(capacity));
        self
    }

    pub fn with_high_propensity_threshold(mut self, threshold: f64) -> Self {
        self.high_propensity_threshold = threshold;
        self
    }

    pub fn engine(&self) -> &FunnelEngine {
        &self.engine
    }

    /// Process one inbound event end to end.
    ///
    /// Delivery failures are logged and reported via `delivered: false`;
    /// they are not errors because the turn is already committed.
    pub async fn process(&self, event: InboundEvent) -> Result<ProcessOutcome> {
        if let Some(message_id) = event.message_id.as_deref() {
            if !self.dedup.lock().await.insert(message_id) {
                debug!(
                    conversation_id = %event.conversation_id,
                    message_id = %message_id,
                    "Dropping duplicate inbound message"
                );
                return Ok(ProcessOutcome::Duplicate {
                    message_id: message_id.to_string(),
                });
            }
        }

        let _lease = self.lock_conversation(&event.conversation_id).await;

        let (turn, profile) = match self.commit_turn(&event).await {
            Ok(committed) => committed,
            Err(e) => {
                // Let a redelivery of this message through.
                if let Some(message_id) = event.message_id.as_deref() {
                    self.dedup.lock().await.forget(message_id);
                }
                return Err(e);
            }
        };

        if profile.score > self.high_propensity_threshold {
            info!(
                conversation_id = %profile.id,
                score = profile.score,
                stage = %profile.stage,
                "High conversion propensity"
            );
        }

        let delivered = self.deliver(&profile.id, &turn.messages).await;

        Ok(ProcessOutcome::Processed {
            turn,
            profile,
            delivered,
        })
    }

    /// Apply a payment-provider confirmation to the conversation's open intent.
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<PaymentIntentRecord> {
        let id = confirmation.conversation_id.as_str();
        let _lease = self.lock_conversation(id).await;

        let mut profile = self.load_existing(id).await?;
        let record =
            self.payments
                .confirm(&mut profile, confirmation.tier, confirmation.amount, Utc::now())?;
        self.repo.put(&profile).await?;
        Ok(record)
    }

    /// Close the conversation's payment cycle so a new link can be issued.
    pub async fn reset_payment_cycle(&self, id: &str) -> Result<Option<PaymentIntentRecord>> {
        let _lease = self.lock_conversation(id).await;

        let mut profile = self.load_existing(id).await?;
        let archived = self.payments.reset(&mut profile);
        self.repo.put(&profile).await?;
        info!(conversation_id = %id, archived = archived.is_some(), "Payment cycle reset");
        Ok(archived)
    }

    /// Start the conversation over with a fresh profile.
    pub async fn reset_conversation(&self, id: &str) -> Result<Profile> {
        let _lease = self.lock_conversation(id).await;
        Ok(self.repo.reset(id).await?)
    }

    /// Committed profile for a conversation, if any.
    pub async fn profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.repo.get(id).await?)
    }

    /// Metrics over every committed profile.
    pub async fn analytics(&self) -> Result<AnalyticsSnapshot> {
        let profiles = self.repo.list().await?;
        Ok(AnalyticsSnapshot::compute(&profiles, Utc::now()))
    }

    async fn commit_turn(&self, event: &InboundEvent) -> Result<(Turn, Profile)> {
        let mut profile = self.repo.get_or_create(&event.conversation_id).await?;
        let turn = self
            .engine
            .process(&mut profile, &event.text, event.received_at);
        self.repo.put(&profile).await?;
        Ok((turn, profile))
    }

    async fn load_existing(&self, id: &str) -> Result<Profile> {
        let profile = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "profile".into(),
                id: id.to_string(),
            })?;
        Ok(profile)
    }

    async fn deliver(&self, conversation_id: &str, messages: &[String]) -> bool {
        if messages.is_empty() {
            return true;
        }
        match self.sink.deliver(conversation_id, messages).await {
            Ok(()) => {
                debug!(
                    conversation_id = %conversation_id,
                    channel = self.sink.name(),
                    count = messages.len(),
                    "Replies delivered"
                );
                true
            }
            Err(e) => {
                error!(
                    conversation_id = %conversation_id,
                    channel = self.sink.name(),
                    error = %e,
                    "Delivery failed; funnel state already committed"
                );
                false
            }
        }
    }

    async fn lock_conversation(&self, id: &str) -> ConversationLease<'_> {
        let lock = {
            let mut locks = self
                .conversation_locks
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        ConversationLease {
            locks: &self.conversation_locks,
            id: id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use crate::error::{DeliveryError, Error, PaymentError};
    use crate::funnel::product::ProductCatalog;
    use crate::funnel::templates::FirstSelector;
    use crate::funnel::types::{PaymentStatus, Stage, Tier};
    use crate::pipeline::types::NullSink;
    use crate::store::InMemoryProfileRepository;

    struct FailingSink;

    #[async_trait]
    impl MessageSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, conversation_id: &str, _: &[String]) -> std::result::Result<(), DeliveryError> {
            Err(DeliveryError::SendFailed {
                channel: "failing".into(),
                conversation_id: conversation_id.into(),
                reason: "gateway down".into(),
            })
        }
    }

    /// Asserts at delivery time that the turn is already committed.
    struct CommitCheckingSink {
        repo: Arc<InMemoryProfileRepository>,
    }

    #[async_trait]
    impl MessageSink for CommitCheckingSink {
        fn name(&self) -> &str {
            "commit-check"
        }

        async fn deliver(&self, conversation_id: &str, _: &[String]) -> std::result::Result<(), DeliveryError> {
            let stored = self.repo.get(conversation_id).await.unwrap();
            assert!(stored.is_some_and(|p| p.message_count > 0));
            Ok(())
        }
    }

    fn engine() -> Arc<FunnelEngine> {
        Arc::new(FunnelEngine::new(
            Arc::new(FirstSelector),
            ProductCatalog::default(),
        ))
    }

    fn processor_with(sink: Arc<dyn MessageSink>) -> (FunnelProcessor, Arc<InMemoryProfileRepository>) {
        let repo = Arc::new(InMemoryProfileRepository::new());
        let processor = FunnelProcessor::new(engine(), repo.clone(), sink);
        (processor, repo)
    }

    #[tokio::test]
    async fn creates_profile_lazily() {
        let (processor, repo) = processor_with(Arc::new(NullSink));
        assert!(repo.is_empty().await);

        let outcome = processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        assert_eq!(outcome.label(), "processed");
        assert_eq!(outcome.messages().len(), 2);
        assert_eq!(repo.get("a").await.unwrap().unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn duplicate_message_id_is_dropped() {
        let (processor, repo) = processor_with(Arc::new(NullSink));
        let event = InboundEvent::new("a", "oi").with_message_id("m-1");

        processor.process(event.clone()).await.unwrap();
        let outcome = processor.process(event).await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Duplicate { .. }));
        assert_eq!(repo.get("a").await.unwrap().unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn events_without_message_id_are_never_deduplicated() {
        let (processor, repo) = processor_with(Arc::new(NullSink));
        processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        assert_eq!(repo.get("a").await.unwrap().unwrap().message_count, 2);
    }

    #[tokio::test]
    async fn delivery_failure_keeps_committed_state() {
        let (processor, repo) = processor_with(Arc::new(FailingSink));
        let outcome = processor.process(InboundEvent::new("a", "oi")).await.unwrap();

        match outcome {
            ProcessOutcome::Processed { delivered, .. } => assert!(!delivered),
            other => panic!("Expected Processed, got {:?}", other),
        }
        assert_eq!(repo.get("a").await.unwrap().unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn commits_before_delivering() {
        let repo = Arc::new(InMemoryProfileRepository::new());
        let sink = Arc::new(CommitCheckingSink { repo: repo.clone() });
        let processor = FunnelProcessor::new(engine(), repo, sink);

        let outcome = processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Processed { delivered: true, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_messages_for_one_id_are_serialized() {
        let (processor, repo) = processor_with(Arc::new(NullSink));
        let processor = Arc::new(processor);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let processor = Arc::clone(&processor);
                let id = if i % 2 == 0 { "even" } else { "odd" };
                tokio::spawn(async move {
                    processor
                        .process(InboundEvent::new(id, "linda"))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.get("even").await.unwrap().unwrap().message_count, 16);
        assert_eq!(repo.get("odd").await.unwrap().unwrap().message_count, 16);
        assert_eq!(lock_count(&processor), 0);
    }

    fn lock_count(processor: &FunnelProcessor) -> usize {
        processor.conversation_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn conversation_locks_are_released_after_each_call() {
        let (processor, _repo) = processor_with(Arc::new(NullSink));
        for i in 0..10 {
            processor
                .process(InboundEvent::new(format!("user-{i}"), "oi"))
                .await
                .unwrap();
        }
        assert_eq!(lock_count(&processor), 0);

        processor.reset_conversation("user-3").await.unwrap();
        let _ = processor.reset_payment_cycle("user-4").await.unwrap();
        let _ = processor
            .confirm_payment(PaymentConfirmation {
                conversation_id: "ghost".into(),
                tier: Tier::Basic,
                amount: dec!(19.90),
            })
            .await;
        assert_eq!(lock_count(&processor), 0);
    }

    #[tokio::test]
    async fn held_lock_survives_until_last_waiter_finishes() {
        let (processor, _repo) = processor_with(Arc::new(NullSink));
        let processor = Arc::new(processor);

        let lease = processor.lock_conversation("a").await;
        let waiter = {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                processor.process(InboundEvent::new("a", "oi")).await.unwrap();
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(lock_count(&processor), 1);

        drop(lease);
        waiter.await.unwrap();
        assert_eq!(lock_count(&processor), 0);
        assert_eq!(processor.profile("a").await.unwrap().unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn confirm_payment_marks_intent_confirmed() {
        let (processor, repo) = processor_with(Arc::new(NullSink));
        let mut profile = Profile::new("a");
        profile.stage = Stage::Closing;
        profile.message_count = 6;
        profile.score = 0.3;
        repo.put(&profile).await.unwrap();

        processor.process(InboundEvent::new("a", "quero")).await.unwrap();
        let stored = repo.get("a").await.unwrap().unwrap();
        let tier = stored.payment_intent.as_ref().unwrap().tier;
        assert_eq!(tier, Tier::Premium);

        let record = processor
            .confirm_payment(PaymentConfirmation {
                conversation_id: "a".into(),
                tier,
                amount: dec!(39.90),
            })
            .await
            .unwrap();
        assert_eq!(record.status, PaymentStatus::Confirmed);

        let stored = repo.get("a").await.unwrap().unwrap();
        assert!(!stored.awaiting_payment);
        // Advisory only: no forced stage change.
        assert_eq!(stored.stage, Stage::Closing);
    }

    #[tokio::test]
    async fn confirm_payment_for_unknown_conversation_fails() {
        let (processor, _repo) = processor_with(Arc::new(NullSink));
        let err = processor
            .confirm_payment(PaymentConfirmation {
                conversation_id: "ghost".into(),
                tier: Tier::Basic,
                amount: dec!(19.90),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Repository(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn confirm_payment_without_offer_fails() {
        let (processor, _repo) = processor_with(Arc::new(NullSink));
        processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        let err = processor
            .confirm_payment(PaymentConfirmation {
                conversation_id: "a".into(),
                tier: Tier::Basic,
                amount: dec!(19.90),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Payment(PaymentError::NoOpenIntent { .. })));
    }

    #[tokio::test]
    async fn reset_payment_cycle_allows_new_offer() {
        let (processor, repo) = processor_with(Arc::new(NullSink));
        let mut profile = Profile::new("a");
        profile.stage = Stage::Closing;
        profile.message_count = 6;
        repo.put(&profile).await.unwrap();

        processor.process(InboundEvent::new("a", "quanto custa")).await.unwrap();
        assert!(repo.get("a").await.unwrap().unwrap().link_sent);

        let archived = processor.reset_payment_cycle("a").await.unwrap();
        assert!(archived.is_some());
        let stored = repo.get("a").await.unwrap().unwrap();
        assert!(!stored.link_sent);
        assert_eq!(stored.payment_history.len(), 1);
    }

    #[tokio::test]
    async fn reset_conversation_starts_over() {
        let (processor, _repo) = processor_with(Arc::new(NullSink));
        processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        processor.process(InboundEvent::new("a", "oi")).await.unwrap();

        let fresh = processor.reset_conversation("a").await.unwrap();
        assert_eq!(fresh.stage, Stage::Initial);
        assert_eq!(processor.profile("a").await.unwrap().unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn analytics_reflect_committed_profiles() {
        let (processor, _repo) = processor_with(Arc::new(NullSink));
        processor.process(InboundEvent::new("a", "oi")).await.unwrap();
        processor.process(InboundEvent::new("b", "olá")).await.unwrap();

        let snapshot = processor.analytics().await.unwrap();
        assert_eq!(snapshot.total_conversations, 2);
        assert_eq!(snapshot.active_today, 2);
        assert_eq!(snapshot.attempted_offers, 0);
    }

    #[tokio::test]
    async fn from_config_uses_configured_catalog() {
        let mut config = FunnelConfig::default();
        config.catalog.basic.payment_link = "https://pay.example.org/b".into();
        config.template_seed = Some(1);

        let repo = Arc::new(InMemoryProfileRepository::new());
        let processor = FunnelProcessor::from_config(&config, repo.clone(), Arc::new(NullSink));

        let mut profile = Profile::new("a");
        profile.stage = Stage::Closing;
        profile.message_count = 6;
        repo.put(&profile).await.unwrap();

        let outcome = processor
            .process(InboundEvent::new("a", "quanto custa"))
            .await
            .unwrap();
        assert!(outcome
            .messages()
            .iter()
            .any(|m| m.contains("https://pay.example.org/b")));
    }
}
