//! Conversation-stage funnel engine.
//!
//! Every inbound message flows through:
//! 1. `IntentExtractor::extract()`: keyword signals
//! 2. `ScoringModel::next_score()`: clamped propensity score
//! 3. `StageTransitionEngine::next_stage()`: funnel FSM
//! 4. `ResponsePolicy::respond()`: outbound messages, offers in `Closing`
//!
//! All of it is synchronous and in-memory.

pub mod engine;
pub mod intent;
pub mod payment;
pub mod product;
pub mod response;
pub mod scoring;
pub mod stage;
pub mod templates;
pub mod types;

pub use engine::{FunnelEngine, FunnelEngineBuilder, Turn};
pub use intent::IntentExtractor;
pub use payment::{PaymentIntentTracker, PaymentTotals};
pub use product::{Product, ProductCatalog, ProductSelector};
pub use response::ResponsePolicy;
pub use scoring::{ScoreWeights, ScoringModel};
pub use stage::{StageThresholds, StageTransitionEngine};
pub use templates::{FirstSelector, RandomSelector, RoundRobinSelector, TemplateSelector};
pub use types::{Intent, PaymentIntentRecord, PaymentStatus, Profile, Stage, Tier};
