//! Funnel processing pipeline.
//!
//! Every inbound text message flows through:
//! 1. `DedupWindow::insert()`: drop gateway redeliveries
//! 2. `FunnelEngine::process()`: intent, score, stage, replies (pure, no I/O)
//! 3. `ProfileRepository::put()`: commit the turn
//! 4. `MessageSink::deliver()`: send replies, failures logged only
//!
//! **State is committed before anything is sent.**

pub mod dedup;
pub mod processor;
pub mod types;

pub use dedup::DedupWindow;
pub use processor::FunnelProcessor;
pub use types::{InboundEvent, MessageSink, NullSink, PaymentConfirmation, ProcessOutcome};
