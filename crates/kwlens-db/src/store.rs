//! [`SessionStore`] implementation backed by Postgres.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use kwlens_core::{ResearchSession, SessionSummary};
use kwlens_engine::{SessionRows, SessionStore, StoreError};

use crate::{sessions, DbError};

/// Postgres-backed session store handed to the research pipeline.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_err(err: DbError) -> StoreError {
    match err {
        DbError::NotFound => StoreError::NotFound,
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn save_session(
        &self,
        user_id: &str,
        name: Option<&str>,
        session: &ResearchSession,
    ) -> Result<Uuid, StoreError> {
        sessions::save_session(&self.pool, user_id, name, session)
            .await
            .map_err(map_err)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, StoreError> {
        sessions::list_sessions(&self.pool, user_id)
            .await
            .map_err(map_err)
    }

    async fn fetch_session_rows(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> Result<Option<SessionRows>, StoreError> {
        match sessions::fetch_session_rows(&self.pool, user_id, session_id).await {
            Ok(rows) => Ok(rows),
            // A corrupt payload is indistinguishable from "not found" for
            // callers; log the detail here and degrade.
            Err(DbError::CorruptPayload(detail)) => {
                tracing::warn!(%session_id, detail = %detail, "stored session is corrupt — reporting missing");
                Ok(None)
            }
            Err(other) => Err(map_err(other)),
        }
    }

    async fn delete_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        sessions::delete_session(&self.pool, user_id, session_id)
            .await
            .map_err(map_err)
    }

    async fn rename_session(
        &self,
        user_id: &str,
        session_id: Uuid,
        name: &str,
    ) -> Result<(), StoreError> {
        sessions::rename_session(&self.pool, user_id, session_id, name)
            .await
            .map_err(map_err)
    }
}
