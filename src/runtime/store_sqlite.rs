//! Sqlite-backed space store.
//!
//! One row per space: the whole [`PersistedSpace`] payload as a JSON text
//! column, replaced on every save. Storage grows with space count, not with
//! save count, so no cleanup policy is needed.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;
use tracing::instrument;

use super::persistence::PersistedSpace;
use super::store::{SpaceStore, StoreError};
use crate::graph::FlowSnapshot;
use crate::types::SpaceId;
use crate::utils::json_ext::JsonSerializable;

const CREATE_SPACES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS spaces (
    id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    saved_at TEXT NOT NULL
)
"#;

/// Durable [`SpaceStore`] over a sqlite database file.
pub struct SqliteSpaceStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteSpaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSpaceStore").finish()
    }
}

impl SqliteSpaceStore {
    /// Connect to (or create) a sqlite database at `database_url`, e.g.
    /// `sqlite://loomflow.db`. The schema is applied idempotently.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Backend {
                message: format!("invalid sqlite url: {e}"),
            })?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("connect error: {e}"),
            })?;
        sqlx::query(CREATE_SPACES_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("schema error: {e}"),
            })?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl SpaceStore for SqliteSpaceStore {
    #[instrument(skip(self), fields(space_id = %space_id), err)]
    async fn load(&self, space_id: &SpaceId) -> Result<Option<FlowSnapshot>, StoreError> {
        let row = sqlx::query("SELECT payload FROM spaces WHERE id = ?1")
            .bind(space_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("load error: {e}"),
            })?;
        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.get("payload");
        let persisted = PersistedSpace::from_json_str(&payload)?;
        Ok(Some(FlowSnapshot::from(persisted)))
    }

    #[instrument(skip(self, snapshot), fields(space_id = %space_id), err)]
    async fn save(&self, space_id: &SpaceId, snapshot: &FlowSnapshot) -> Result<(), StoreError> {
        let payload = PersistedSpace::from(snapshot).to_json_string()?;
        sqlx::query(
            r#"
            INSERT INTO spaces (id, payload, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(space_id.as_str())
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| StoreError::Backend {
            message: format!("save error: {e}"),
        })?;
        Ok(())
    }
}
