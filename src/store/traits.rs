//! `ProfileRepository` trait: the single persistence seam for funnel state.
//!
//! Backends (in-memory, SQL, KV) only ever see whole, committed profiles.

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::funnel::types::Profile;

/// Backend-agnostic storage for conversation profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch a profile by conversation id.
    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError>;

    /// Insert or replace a profile.
    async fn put(&self, profile: &Profile) -> Result<(), RepositoryError>;

    /// Replace a conversation with a fresh profile. Returns the new profile.
    async fn reset(&self, id: &str) -> Result<Profile, RepositoryError>;

    /// Snapshot of every stored profile.
    async fn list(&self) -> Result<Vec<Profile>, RepositoryError>;

    /// Fetch or lazily create.
    async fn get_or_create(&self, id: &str) -> Result<Profile, RepositoryError> {
        Ok(self.get(id).await?.unwrap_or_else(|| Profile::new(id)))
    }
}
