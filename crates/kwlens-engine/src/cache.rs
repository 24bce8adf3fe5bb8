//! Write-through result cache facade and the default in-memory backend.
//!
//! The facade owns key construction and TTL policy and never lets a cache
//! problem escape: backend errors and corrupt entries are logged and read
//! as misses. The pipeline consults it before reaching for the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use kwlens_core::{ResearchSession, SessionSummary};

use crate::traits::{CacheError, ResultCache};

/// TTL for the full assembled session.
pub const FULL_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
/// TTL for the aggregated, comparison, and opportunity components.
pub const COMPONENT_TTL: Duration = Duration::from_secs(15 * 60);
/// TTL for the gap component. Gaps shift slowly; cache them longer.
pub const GAPS_TTL: Duration = Duration::from_secs(60 * 60);
/// TTL for a user's session list.
pub const SESSION_LIST_TTL: Duration = Duration::from_secs(5 * 60);

/// Individually cacheable session components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Aggregated,
    Comparisons,
    Opportunities,
    Gaps,
}

impl Component {
    fn key_part(self) -> &'static str {
        match self {
            Component::Aggregated => "aggregated",
            Component::Comparisons => "comparisons",
            Component::Opportunities => "opportunities",
            Component::Gaps => "gaps",
        }
    }

    fn ttl(self) -> Duration {
        match self {
            Component::Aggregated | Component::Comparisons | Component::Opportunities => {
                COMPONENT_TTL
            }
            Component::Gaps => GAPS_TTL,
        }
    }
}

/// Typed, error-swallowing view over a [`ResultCache`] backend.
#[derive(Clone)]
pub struct CacheFacade {
    backend: Arc<dyn ResultCache>,
}

impl CacheFacade {
    #[must_use]
    pub fn new(backend: Arc<dyn ResultCache>) -> Self {
        Self { backend }
    }

    fn session_key(user_id: &str, session_id: Uuid) -> String {
        format!("kwlens:{user_id}:{session_id}:full")
    }

    fn component_key(user_id: &str, session_id: Uuid, component: Component) -> String {
        format!("kwlens:{user_id}:{session_id}:{}", component.key_part())
    }

    fn list_key(user_id: &str) -> String {
        format!("kwlens:{user_id}:sessions")
    }

    pub async fn get_session(&self, user_id: &str, session_id: Uuid) -> Option<ResearchSession> {
        self.get_typed(&Self::session_key(user_id, session_id)).await
    }

    /// Write the full session and every component through in one pass.
    pub async fn put_session(&self, user_id: &str, session_id: Uuid, session: &ResearchSession) {
        self.set_typed(
            &Self::session_key(user_id, session_id),
            session,
            FULL_SESSION_TTL,
        )
        .await;
        self.set_typed(
            &Self::component_key(user_id, session_id, Component::Aggregated),
            &session.aggregated,
            Component::Aggregated.ttl(),
        )
        .await;
        self.set_typed(
            &Self::component_key(user_id, session_id, Component::Comparisons),
            &session.comparisons,
            Component::Comparisons.ttl(),
        )
        .await;
        self.set_typed(
            &Self::component_key(user_id, session_id, Component::Opportunities),
            &session.opportunities,
            Component::Opportunities.ttl(),
        )
        .await;
        if let Some(gaps) = &session.gaps {
            self.set_typed(
                &Self::component_key(user_id, session_id, Component::Gaps),
                gaps,
                Component::Gaps.ttl(),
            )
            .await;
        }
    }

    pub async fn get_component<T: DeserializeOwned>(
        &self,
        user_id: &str,
        session_id: Uuid,
        component: Component,
    ) -> Option<T> {
        self.get_typed(&Self::component_key(user_id, session_id, component))
            .await
    }

    pub async fn get_session_list(&self, user_id: &str) -> Option<Vec<SessionSummary>> {
        self.get_typed(&Self::list_key(user_id)).await
    }

    pub async fn put_session_list(&self, user_id: &str, sessions: &[SessionSummary]) {
        self.set_typed(&Self::list_key(user_id), &sessions, SESSION_LIST_TTL)
            .await;
    }

    /// Drop everything cached for one session, or for the whole user when
    /// `session_id` is `None`. The session list is dropped either way.
    pub async fn invalidate(&self, user_id: &str, session_id: Option<Uuid>) {
        let prefix = match session_id {
            Some(id) => format!("kwlens:{user_id}:{id}:"),
            None => format!("kwlens:{user_id}:"),
        };
        if let Err(e) = self.backend.invalidate_prefix(&prefix).await {
            tracing::warn!(error = %e, "cache invalidation failed");
        }
        if session_id.is_some() {
            self.invalidate_session_list(user_id).await;
        }
    }

    /// Drop only the cached session list, e.g. after a save or rename.
    pub async fn invalidate_session_list(&self, user_id: &str) {
        if let Err(e) = self.backend.invalidate_prefix(&Self::list_key(user_id)).await {
            tracing::warn!(error = %e, "session list invalidation failed");
        }
    }

    async fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(typed) => Some(typed),
                Err(e) => {
                    tracing::warn!(key, error = %e, "corrupt cache entry — treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed — treating as miss");
                None
            }
        }
    }

    async fn set_typed<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache serialization failed — skipping write");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, json, ttl).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }
}

struct Entry {
    expires_at: Instant,
    value: serde_json::Value,
}

/// Default in-process backend: a deadline-checked map behind an async
/// `RwLock`. Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Entry exists but is expired: upgrade to a write lock and drop it.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.write().await.insert(
            key.to_owned(),
            Entry {
                expires_at: Instant::now() + ttl,
                value,
            },
        );
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
