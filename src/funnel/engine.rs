//! Funnel engine: one synchronous step per inbound message.
//!
//! extract → touch profile → score → transition → respond.
//! No I/O happens here; callers persist the mutated profile and deliver the
//! returned messages afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::funnel::intent::IntentExtractor;
use crate::funnel::product::{ProductCatalog, ProductSelector};
use crate::funnel::response::{ResponseContext, ResponsePolicy};
use crate::funnel::scoring::{ScoreWeights, ScoringModel};
use crate::funnel::stage::{StageThresholds, StageTransitionEngine, TransitionInput};
use crate::funnel::templates::{RandomSelector, TemplateSelector};
use crate::funnel::types::{Intent, Profile, Stage};

/// Outcome of processing one message.
#[derive(Debug, Clone)]
pub struct Turn {
    pub intent: Intent,
    pub previous_stage: Stage,
    pub stage: Stage,
    pub previous_score: f64,
    pub score: f64,
    /// Outbound messages in send order.
    pub messages: Vec<String>,
    /// A payment link was issued on this turn.
    pub offer_issued: bool,
}

impl Turn {
    pub fn stage_changed(&self) -> bool {
        self.previous_stage != self.stage
    }
}

/// Composes extraction, scoring, transitions and the response policy.
pub struct FunnelEngine {
    extractor: IntentExtractor,
    scoring: ScoringModel,
    transitions: StageTransitionEngine,
    policy: ResponsePolicy,
}

impl FunnelEngine {
    /// Engine with canonical weights and thresholds.
    pub fn new(templates: Arc<dyn TemplateSelector>, catalog: ProductCatalog) -> Self {
        Self::builder().templates(templates).catalog(catalog).build()
    }

    pub fn builder() -> FunnelEngineBuilder {
        FunnelEngineBuilder::default()
    }

    pub fn extractor(&self) -> &IntentExtractor {
        &self.extractor
    }

    pub fn scoring(&self) -> &ScoringModel {
        &self.scoring
    }

    pub fn transitions(&self) -> &StageTransitionEngine {
        &self.transitions
    }

    pub fn policy(&self) -> &ResponsePolicy {
        &self.policy
    }

    /// Run one inbound message against `profile`, mutating it in place.
    pub fn process(&self, profile: &mut Profile, text: &str, now: DateTime<Utc>) -> Turn {
        let intent = self.extractor.extract(text);

        profile.message_count += 1;
        profile.last_interaction = Some(now);
        let new_location = capture_location(profile, &intent);

        let previous_score = profile.score;
        profile.score = self.scoring.next_score(previous_score, &intent);

        let previous_stage = profile.stage.clone();
        profile.stage = self.transitions.next_stage(TransitionInput {
            current: &previous_stage,
            score: profile.score,
            intent: &intent,
            message_count: profile.message_count,
            closing_turns: profile.closing_turns,
        });

        if profile.stage != previous_stage {
            info!(
                conversation_id = %profile.id,
                from = %previous_stage,
                to = %profile.stage,
                score = profile.score,
                "Stage transition"
            );
        }

        let link_sent_before = profile.link_sent;
        let messages = self.policy.respond(
            profile,
            &intent,
            text,
            ResponseContext { new_location, now },
        );
        if profile.stage == Stage::Closing {
            profile.closing_turns += 1;
        }

        debug!(
            conversation_id = %profile.id,
            stage = %profile.stage,
            score = profile.score,
            replies = messages.len(),
            "Turn processed"
        );

        Turn {
            previous_stage,
            stage: profile.stage.clone(),
            previous_score,
            score: profile.score,
            messages,
            offer_issued: !link_sent_before && profile.link_sent,
            intent,
        }
    }
}

/// Store the first detected location. Returns whether this message set it.
fn capture_location(profile: &mut Profile, intent: &Intent) -> bool {
    match (&profile.location, &intent.location) {
        (None, Some(place)) => {
            profile.location = Some(title_case(place));
            true
        }
        _ => false,
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builder for [`FunnelEngine`].
#[derive(Default)]
pub struct FunnelEngineBuilder {
    templates: Option<Arc<dyn TemplateSelector>>,
    catalog: Option<ProductCatalog>,
    weights: Option<ScoreWeights>,
    thresholds: Option<StageThresholds>,
}

impl FunnelEngineBuilder {
    pub fn templates(mut self, templates: Arc<dyn TemplateSelector>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn catalog(mut self, catalog: ProductCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn thresholds(mut self, thresholds: StageThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn build(self) -> FunnelEngine {
        let templates = self
            .templates
            .unwrap_or_else(|| Arc::new(RandomSelector::new()));
        let products = ProductSelector::new(self.catalog.unwrap_or_default());
        FunnelEngine {
            extractor: IntentExtractor::new(),
            scoring: ScoringModel::new(self.weights.unwrap_or_default()),
            transitions: StageTransitionEngine::new(self.thresholds.unwrap_or_default()),
            policy: ResponsePolicy::new(templates, products),
        }
    }
}
