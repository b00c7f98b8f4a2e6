//! Response policy: what to say at each stage.
//!
//! Replies are keyed by the stage the profile is in after the transition.
//! Each logical part of a reply (greeting, question, price, link) is a
//! separate outbound message, in send order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::funnel::intent::KeywordSet;
use crate::funnel::payment::PaymentIntentTracker;
use crate::funnel::product::{Product, ProductSelector};
use crate::funnel::templates::{Pool, TemplateSelector};
use crate::funnel::types::{Intent, Profile, Stage};

const WORK_INQUIRY_WORDS: &[&str] = &["trabalha", "trabalhas", "faz", "fazes"];
const DISTRUST_WORDS: &[&str] = &["taxa", "roubar"];
const CONFIRMATION_WORDS: &[&str] = &["sim", "quero"];

const THANKS_PREFIX: &str = "Obrigada! 😘";
const WORK_CUE: &str = "Trabalho com algo bem especial...";
const PRICE_BRIDGE: &str = "Antes de falar de valores, conta-me: tens interesse mesmo?";
const REQUALIFY: &str = "Então, tens interesse mesmo?";
const LINK_REMINDER: &str = "O link já está aí em cima, é só usar quando quiseres 😉";
const CONVERTED_REPLY: &str = "Obrigada! Vais adorar! 😘💋";
const FALLBACK_REPLY: &str = "Conta-me mais... 😊";

/// Per-message facts the policy can't derive from the profile alone.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext {
    /// The location on the profile was captured by this message.
    pub new_location: bool,
    pub now: DateTime<Utc>,
}

/// Chooses outbound messages for a profile at its current stage.
pub struct ResponsePolicy {
    templates: Arc<dyn TemplateSelector>,
    products: ProductSelector,
    payments: PaymentIntentTracker,
    work_inquiry: KeywordSet,
    distrust: KeywordSet,
    confirmation: KeywordSet,
}

impl ResponsePolicy {
    pub fn new(templates: Arc<dyn TemplateSelector>, products: ProductSelector) -> Self {
        Self {
            templates,
            products,
            payments: PaymentIntentTracker::new(),
            work_inquiry: KeywordSet::new(WORK_INQUIRY_WORDS),
            distrust: KeywordSet::new(DISTRUST_WORDS),
            confirmation: KeywordSet::new(CONFIRMATION_WORDS),
        }
    }

    pub fn products(&self) -> &ProductSelector {
        &self.products
    }

    /// Outbound messages for this turn.
    ///
    /// May issue a payment intent on the profile when in `Closing`.
    pub fn respond(
        &self,
        profile: &mut Profile,
        intent: &Intent,
        raw_text: &str,
        ctx: ResponseContext,
    ) -> Vec<String> {
        let lowered = raw_text.to_lowercase();

        match profile.stage.clone() {
            Stage::Initial => self.initial(profile, intent),
            Stage::Qualification => self.qualification(profile, intent, &lowered, ctx),
            Stage::Interest => self.interest(intent),
            Stage::Objections => self.objections(intent, &lowered),
            Stage::Closing => self.closing(profile, intent, &lowered, ctx.now),
            Stage::Converted => vec![CONVERTED_REPLY.to_string()],
            Stage::Unknown(raw) => {
                warn!(
                    conversation_id = %profile.id,
                    stage = %raw,
                    "Unrecognized stage on profile, sending fallback reply"
                );
                vec![FALLBACK_REPLY.to_string()]
            }
        }
    }

    fn pick(&self, pool: Pool) -> String {
        self.templates.pick(pool).to_string()
    }

    fn initial(&self, profile: &Profile, intent: &Intent) -> Vec<String> {
        if intent.greeting {
            let mut out = vec![self.pick(Pool::Greeting)];
            if profile.location.is_none() {
                out.push(self.pick(Pool::LocationQuestion));
            }
            return out;
        }
        if intent.location.is_some() {
            if let Some(place) = profile.location.as_deref() {
                return vec![format!(
                    "Ah, {place}! Que bom! Em que posso ajudar hoje? 😊"
                )];
            }
        }
        vec![self.pick(Pool::Greeting)]
    }

    fn qualification(
        &self,
        profile: &Profile,
        intent: &Intent,
        lowered: &str,
        ctx: ResponseContext,
    ) -> Vec<String> {
        if ctx.new_location {
            if let Some(place) = profile.location.as_deref() {
                return vec![format!("Que bom, {place}!"), self.pick(Pool::Qualification)];
            }
        }
        if intent.compliment {
            return vec![THANKS_PREFIX.to_string(), self.pick(Pool::Qualification)];
        }
        if self.work_inquiry.is_match(lowered) {
            return vec![WORK_CUE.to_string(), self.pick(Pool::Qualification)];
        }
        vec![self.pick(Pool::Qualification)]
    }

    fn interest(&self, intent: &Intent) -> Vec<String> {
        if intent.positive_signal {
            return vec![self.pick(Pool::Pitch)];
        }
        if intent.price_question {
            return vec![PRICE_BRIDGE.to_string(), self.pick(Pool::Pitch)];
        }
        vec![self.pick(Pool::Pitch)]
    }

    fn objections(&self, intent: &Intent, lowered: &str) -> Vec<String> {
        if intent.trust_concern || self.distrust.is_match(lowered) {
            return vec![self.pick(Pool::Reassurance)];
        }
        vec![REQUALIFY.to_string(), self.pick(Pool::Pitch)]
    }

    fn closing(
        &self,
        profile: &mut Profile,
        intent: &Intent,
        lowered: &str,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let offer = self.current_offer(profile);
        let wants_in = intent.positive_signal || self.confirmation.is_match(lowered);

        if wants_in {
            if self.payments.issue(profile, &offer, now) {
                return vec![
                    self.pick(Pool::ClosingCall),
                    format!("Para clientes especiais como tu: {}", offer.price_label()),
                    format!("O link está aqui: {}", offer.payment_link),
                ];
            }
            return vec![LINK_REMINDER.to_string()];
        }

        if intent.price_question {
            let quote = format!("Para ti: {} - {}", offer.price_label(), offer.description);
            if self.payments.issue(profile, &offer, now) {
                return vec![quote, self.pick(Pool::ClosingCall), offer.payment_link.clone()];
            }
            return vec![quote, LINK_REMINDER.to_string()];
        }

        vec![self.pick(Pool::Nudge)]
    }

    /// Offer already quoted this cycle, else the one the score selects.
    fn current_offer(&self, profile: &Profile) -> Product {
        let catalog = self.products.catalog();
        match profile.payment_intent.as_ref() {
            Some(record) if profile.link_sent => catalog.get(record.tier).clone(),
            _ => self.products.select(profile).clone(),
        }
    }
}
