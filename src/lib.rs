//! Funnel Engine: staged sales-conversation automation.

pub mod analytics;
pub mod config;
pub mod error;
pub mod funnel;
pub mod pipeline;
pub mod store;
