//! Error types for the funnel engine.

use crate::funnel::types::Tier;

/// Error returned by processor operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Configuration-related errors. Surfaced directly by `FunnelConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Profile repository errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

/// Outbound delivery errors (messaging gateway).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to deliver to {conversation_id} via {channel}: {reason}")]
    SendFailed {
        channel: String,
        conversation_id: String,
        reason: String,
    },
}

/// Payment-intent errors.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("No payment intent issued for conversation {conversation_id}")]
    NoOpenIntent { conversation_id: String },

    #[error("Payment intent for {conversation_id} already confirmed")]
    AlreadyConfirmed { conversation_id: String },

    #[error("Confirmed tier {confirmed} does not match issued tier {issued} for {conversation_id}")]
    TierMismatch {
        conversation_id: String,
        issued: Tier,
        confirmed: Tier,
    },
}

/// Result type alias for the funnel engine.
pub type Result<T> = std::result::Result<T, Error>;
