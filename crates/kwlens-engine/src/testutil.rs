//! In-memory fakes and fixture builders shared across the engine's tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use kwlens_core::{
    GapImpact, GapRecord, GapType, KeywordAttributes, KeywordOccurrence, OpportunityCandidate,
    OpportunityType, ResearchSession, SessionSummary,
};
use kwlens_provider::{MiningFilters, ProviderError};

use crate::traits::{
    KeywordDataProvider, SessionRows, SessionStore, StoreError, StoredProduct, StoredRanking,
};

pub fn occurrence(
    keyword: &str,
    search_volume: u32,
    cpc: f64,
    position: Option<u32>,
) -> KeywordOccurrence {
    KeywordOccurrence {
        keyword: keyword.to_string(),
        search_volume,
        cpc,
        position,
        traffic_share: position.map(|p| 10.0 / f64::from(p)),
        attrs: KeywordAttributes::default(),
    }
}

pub fn occurrence_with_attrs(
    keyword: &str,
    search_volume: u32,
    cpc: f64,
    position: Option<u32>,
    customize: impl FnOnce(&mut KeywordAttributes),
) -> KeywordOccurrence {
    let mut occ = occurrence(keyword, search_volume, cpc, position);
    customize(&mut occ.attrs);
    occ
}

pub fn candidate(keyword: &str, search_volume: u32, avg_cpc: f64) -> OpportunityCandidate {
    OpportunityCandidate {
        keyword: keyword.to_string(),
        search_volume,
        avg_cpc,
        competitors_in_top15: 0,
        competitors_ranking: 0,
        avg_competitor_rank: 0.0,
        competitor_strength: 1.0,
        opportunity_type: OpportunityType::MarketGap,
        attrs: KeywordAttributes::default(),
    }
}

pub fn gap_record(keyword: &str, search_volume: u32, gap_score: u8) -> GapRecord {
    GapRecord {
        keyword: keyword.to_string(),
        search_volume,
        avg_cpc: 1.0,
        gap_type: GapType::MarketGap,
        gap_score,
        user_ranking: None,
        competitor_rankings: Vec::new(),
        recommendation: String::new(),
        potential_impact: GapImpact::Medium,
        attrs: KeywordAttributes::default(),
    }
}

/// Flatten a session into the normalized rows a store would persist.
pub fn session_to_rows(session: &ResearchSession) -> SessionRows {
    let products = session
        .collections
        .iter()
        .enumerate()
        .map(|(ordinal, c)| StoredProduct {
            asin: c.asin.clone(),
            ordinal: u32::try_from(ordinal).unwrap_or(u32::MAX),
            status: c.status.clone(),
        })
        .collect();

    let rankings = session
        .collections
        .iter()
        .flat_map(|c| {
            c.occurrences.iter().map(|occ| StoredRanking {
                asin: c.asin.clone(),
                keyword: occ.keyword.clone(),
                search_volume: occ.search_volume,
                cpc: occ.cpc,
                position: occ.position,
                traffic_share: occ.traffic_share,
                attrs: occ.attrs.clone(),
            })
        })
        .collect();

    SessionRows {
        options: session.options.clone(),
        products,
        rankings,
        opportunities: session.opportunities.opportunities.clone(),
        mined: session.opportunities.mined.clone(),
        gaps: session
            .gaps
            .as_ref()
            .map(|g| g.gaps.clone())
            .unwrap_or_default(),
        created_at: session.created_at,
    }
}

/// Scripted provider double: canned per-ASIN results, canned mining
/// results, and call logs for asserting rate-limit/dedupe behavior.
#[derive(Default)]
pub struct MockProvider {
    asin_results: HashMap<String, Result<Vec<KeywordOccurrence>, String>>,
    mining_results: HashMap<String, Vec<KeywordOccurrence>>,
    mining_fails: bool,
    reverse_calls: Mutex<Vec<String>>,
    mining_calls: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_asin(mut self, asin: &str, occurrences: Vec<KeywordOccurrence>) -> Self {
        self.asin_results.insert(asin.to_string(), Ok(occurrences));
        self
    }

    #[must_use]
    pub fn with_failure(mut self, asin: &str, message: &str) -> Self {
        self.asin_results
            .insert(asin.to_string(), Err(message.to_string()));
        self
    }

    #[must_use]
    pub fn with_mining(mut self, keyword: &str, occurrences: Vec<KeywordOccurrence>) -> Self {
        self.mining_results.insert(keyword.to_string(), occurrences);
        self
    }

    #[must_use]
    pub fn with_mining_failure(mut self) -> Self {
        self.mining_fails = true;
        self
    }

    pub fn reverse_calls(&self) -> Vec<String> {
        self.reverse_calls.lock().unwrap().clone()
    }

    pub fn mining_calls(&self) -> Vec<String> {
        self.mining_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeywordDataProvider for MockProvider {
    async fn reverse_asin(
        &self,
        asin: &str,
        page: u32,
        _page_size: u32,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError> {
        self.reverse_calls.lock().unwrap().push(asin.to_string());
        if page > 1 {
            return Ok(Vec::new());
        }
        match self.asin_results.get(asin) {
            Some(Ok(occurrences)) => Ok(occurrences.clone()),
            Some(Err(message)) => Err(ProviderError::Api(message.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn keyword_mining(
        &self,
        keyword: &str,
        _filters: &MiningFilters,
    ) -> Result<Vec<KeywordOccurrence>, ProviderError> {
        self.mining_calls.lock().unwrap().push(keyword.to_string());
        if self.mining_fails {
            return Err(ProviderError::Api("mining unavailable".to_string()));
        }
        Ok(self.mining_results.get(keyword).cloned().unwrap_or_default())
    }
}

struct StoredSession {
    user_id: String,
    name: Option<String>,
    rows: SessionRows,
    created_at: DateTime<Utc>,
}

/// In-memory session store double.
#[derive(Default)]
pub struct MockStore {
    sessions: Mutex<HashMap<Uuid, StoredSession>>,
    fetches: Mutex<usize>,
}

impl MockStore {
    pub fn saved_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl SessionStore for MockStore {
    async fn save_session(
        &self,
        user_id: &str,
        name: Option<&str>,
        session: &ResearchSession,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.sessions.lock().unwrap().insert(
            id,
            StoredSession {
                user_id: user_id.to_string(),
                name: name.map(str::to_string),
                rows: session_to_rows(session),
                created_at: session.created_at,
            },
        );
        Ok(id)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .filter(|(_, s)| s.user_id == user_id)
            .map(|(id, s)| SessionSummary {
                id: *id,
                name: s.name.clone(),
                products: s
                    .rows
                    .products
                    .iter()
                    .map(|p| p.asin.clone())
                    .collect(),
                created_at: s.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn fetch_session_rows(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<Option<SessionRows>, StoreError> {
        *self.fetches.lock().unwrap() += 1;
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .get(&session_id)
            .filter(|s| s.user_id == user_id)
            .map(|s| s.rows.clone()))
    }

    async fn delete_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(&session_id) {
            Some(s) if s.user_id == user_id => {
                sessions.remove(&session_id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn rename_session(
        &self,
        user_id: &str,
        session_id: Uuid,
        name: &str,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&session_id) {
            Some(s) if s.user_id == user_id => {
                s.name = Some(name.to_string());
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }
}
