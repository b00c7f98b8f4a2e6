//! Boundary types for the funnel pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::funnel::engine::Turn;
use crate::funnel::types::{Profile, Tier};

// ── Inbound event ───────────────────────────────────────────────────

/// One inbound text message, already normalized by the gateway adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Conversation identity (phone number, chat id).
    pub conversation_id: String,
    /// Message body. May be empty.
    pub text: String,
    pub received_at: DateTime<Utc>,
    /// Gateway message id, used to drop redelivered events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl InboundEvent {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            received_at: Utc::now(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

// ── Payment confirmation ────────────────────────────────────────────

/// Payment notice from the payment-provider webhook adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub conversation_id: String,
    pub tier: Tier,
    pub amount: Decimal,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Result of handing one inbound event to the processor.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Same message id was seen recently; nothing changed.
    Duplicate { message_id: String },
    /// Profile committed; `delivered` reports the sink result.
    Processed {
        turn: Turn,
        profile: Profile,
        delivered: bool,
    },
}

impl ProcessOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Duplicate { .. } => "duplicate",
            Self::Processed { .. } => "processed",
        }
    }

    /// Outbound messages, empty for duplicates.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Duplicate { .. } => &[],
            Self::Processed { turn, .. } => &turn.messages,
        }
    }
}

// ── Delivery ────────────────────────────────────────────────────────

/// Messaging-gateway collaborator. Pure I/O, no funnel logic.
///
/// Called only after the profile for this turn has been committed.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Channel name for logs (e.g. "whatsapp", "cli").
    fn name(&self) -> &str;

    /// Deliver messages in order.
    async fn deliver(&self, conversation_id: &str, messages: &[String])
        -> Result<(), DeliveryError>;
}

/// Sink that drops everything. For runs where delivery is handled elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl MessageSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn deliver(
        &self,
        _conversation_id: &str,
        _messages: &[String],
    ) -> Result<(), DeliveryError> {
        Ok(())
    }
}
