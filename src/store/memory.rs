//! In-memory profile repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::ProfileRepository;
use crate::error::RepositoryError;
use crate::funnel::types::Profile;

/// Process-lifetime store keyed by conversation id.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn put(&self, profile: &Profile) -> Result<(), RepositoryError> {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn reset(&self, id: &str) -> Result<Profile, RepositoryError> {
        let fresh = Profile::new(id);
        self.profiles
            .write()
            .await
            .insert(id.to_string(), fresh.clone());
        debug!(conversation_id = %id, "Profile reset");
        Ok(fresh)
    }

    async fn list(&self) -> Result<Vec<Profile>, RepositoryError> {
        Ok(self.profiles.read().await.values().cloned().collect())
    }
}
