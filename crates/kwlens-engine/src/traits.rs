//! Collaborator seams of the pipeline.
//!
//! The engine never talks to HTTP, Redis-alikes, or Postgres directly; it
//! receives these trait objects at construction time. That keeps every
//! algorithm testable with in-memory fakes and keeps process-wide
//! singletons out of the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use kwlens_core::{
    KeywordAttributes, KeywordOccurrence, ProductStatus, ResearchOptions, ResearchSession,
    SessionSummary,
};
use kwlens_provider::{MiningFilters, ProviderClient, ProviderError};

/// External keyword-data provider: the cheap per-product export plus the
/// expensive mining/enrichment lookup. Either call may fail independently;
/// the engine isolates failures so sibling calls proceed.
#[async_trait]
pub trait KeywordDataProvider: Send + Sync {
    async fn reverse_asin(
        &self,
        asin: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError>;

    async fn keyword_mining(
        &self,
        keyword: &str,
        filters: &MiningFilters,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError>;
}

#[async_trait]
impl KeywordDataProvider for ProviderClient {
    async fn reverse_asin(
        &self,
        asin: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError> {
        ProviderClient::reverse_asin(self, asin, page, page_size).await
    }

    async fn keyword_mining(
        &self,
        keyword: &str,
        filters: &MiningFilters,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError> {
        ProviderClient::keyword_mining(self, keyword, filters).await
    }
}

/// Errors from the persistent session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,

    #[error("storage error: {0}")]
    Backend(String),
}

/// A product row as persisted for one session.
#[derive(Debug, Clone)]
pub struct StoredProduct {
    pub asin: String,
    /// Zero-based position in the research order; 0 is the primary product.
    pub ordinal: u32,
    pub status: ProductStatus,
}

/// One normalized (product, keyword) ranking row from the store.
#[derive(Debug, Clone)]
pub struct StoredRanking {
    pub asin: String,
    pub keyword: String,
    pub search_volume: u32,
    pub cpc: f64,
    pub position: Option<u32>,
    pub traffic_share: Option<f64>,
    pub attrs: KeywordAttributes,
}

/// The normalized rows needed to deterministically rebuild a session.
#[derive(Debug, Clone)]
pub struct SessionRows {
    pub options: ResearchOptions,
    pub products: Vec<StoredProduct>,
    pub rankings: Vec<StoredRanking>,
    pub opportunities: Vec<kwlens_core::OpportunityCandidate>,
    pub mined: Vec<kwlens_core::OpportunityCandidate>,
    pub gaps: Vec<kwlens_core::GapRecord>,
    pub created_at: DateTime<Utc>,
}

/// Persistent store for completed sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a completed session; returns its public id.
    async fn save_session(
        &self,
        user_id: &str,
        name: Option<&str>,
        session: &ResearchSession,
    ) -> Result<Uuid, StoreError>;

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, StoreError>;

    /// Fetch the normalized rows for one session, or `None` when the id is
    /// unknown for this user. Backend errors are mapped by callers to
    /// not-found rather than leaking storage detail.
    async fn fetch_session_rows(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<Option<SessionRows>, StoreError>;

    async fn delete_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError>;

    async fn rename_session(
        &self,
        user_id: &str,
        session_id: Uuid,
        name: &str,
    ) -> Result<(), StoreError>;
}

/// Cache backend error. Always logged and swallowed by the facade; a cache
/// problem is a miss, never a pipeline failure.
#[derive(Debug, Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

/// Write-through TTL cache backend keyed by opaque strings.
///
/// The typed facade in [`crate::cache`] owns key construction and TTL
/// policy; backends only store JSON values until a deadline.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: std::time::Duration,
    ) -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<(), CacheError>;
}
