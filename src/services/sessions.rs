//! In-memory registry of client sessions.
//!
//! Each session owns exactly one [`ForecastCache`]; caches are never shared
//! between sessions. Sessions and their caches live for the lifetime of the
//! process.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::forecast::ForecastCache;

/// A client session and its forecast memo.
#[derive(Debug)]
pub struct Session {
    pub created_at: DateTime<Utc>,
    pub cache: ForecastCache,
}

/// Shared session registry handle.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session with an empty cache.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let session = Session {
            created_at: Utc::now(),
            cache: ForecastCache::new(),
        };
        self.inner.write().await.insert(id, session);
        tracing::debug!("Created session {}", id);
        id
    }

    /// Run `f` against the cache of session `id`.
    ///
    /// Returns `None` if no such session exists. `f` runs under the registry's
    /// write lock and must not block.
    pub async fn with_cache<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ForecastCache) -> T,
    ) -> Option<T> {
        let mut sessions = self.inner.write().await;
        sessions.get_mut(&id).map(|session| f(&mut session.cache))
    }

    /// Creation time and number of cached forecasts for session `id`.
    pub async fn describe(&self, id: Uuid) -> Option<(DateTime<Utc>, usize)> {
        let sessions = self.inner.read().await;
        sessions
            .get(&id)
            .map(|session| (session.created_at, session.cache.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_registers_empty_session() {
        let registry = SessionRegistry::new();
        let id = registry.create().await;

        let (_, cached) = registry.describe(id).await.unwrap();
        assert_eq!(cached, 0);
        assert_ne!(registry.create().await, id);
    }

    #[tokio::test]
    async fn test_with_cache_unknown_session() {
        let registry = SessionRegistry::new();
        assert!(registry.with_cache(Uuid::new_v4(), |c| c.len()).await.is_none());
        assert!(registry.describe(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_sessions() {
        let registry = SessionRegistry::new();
        let handle = registry.clone();
        let id = registry.create().await;

        assert_eq!(handle.with_cache(id, |c| c.is_empty()).await, Some(true));
    }
}
