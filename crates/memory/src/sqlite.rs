//! SQLite record store.
//!
//! One table, `records`, keyed by an `AUTOINCREMENT` id so ids are never
//! reused even after the newest rows are swept. Timestamps are stored as
//! fixed-width RFC 3339 strings (microseconds, `Z` suffix) so that string
//! comparison orders them chronologically. Embeddings are little-endian
//! `f32` blobs; tags are a JSON array.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use recall_core::error::StoreError;
use recall_core::memory::{MemoryRecord, NewRecord, RecordId, RecordStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// A SQLite-backed record store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("Failed to create store directory: {e}")))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(path = %path.display(), "SQLite record store initialized");
        Ok(store)
    }

    /// An ephemeral database living in a single pooled connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to open in-memory SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                source      TEXT NOT NULL,
                text        TEXT NOT NULL,
                embedding   BLOB,
                tags        TEXT NOT NULL DEFAULT '[]',
                session_id  TEXT,
                role        TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("records table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("timestamp index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_session ON records(session_id, id DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_embedding(id: RecordId, blob: &[u8]) -> Result<Vec<f32>, StoreError> {
        if blob.len() % 4 != 0 {
            return Err(StoreError::Corrupt(format!(
                "record {id}: embedding blob of {} bytes",
                blob.len()
            )));
        }
        Ok(blob
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Parse a `MemoryRecord` from a row.
    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryRecord, StoreError> {
        let column = |name: &str, e: sqlx::Error| StoreError::Query(format!("{name} column: {e}"));

        let id: i64 = row.try_get("id").map_err(|e| column("id", e))?;
        let id = id as RecordId;
        let timestamp: String = row.try_get("timestamp").map_err(|e| column("timestamp", e))?;
        let source: String = row.try_get("source").map_err(|e| column("source", e))?;
        let text: String = row.try_get("text").map_err(|e| column("text", e))?;
        let blob: Option<Vec<u8>> = row.try_get("embedding").map_err(|e| column("embedding", e))?;
        let tags_json: String = row.try_get("tags").map_err(|e| column("tags", e))?;
        let session_id: Option<String> =
            row.try_get("session_id").map_err(|e| column("session_id", e))?;
        let role: Option<String> = row.try_get("role").map_err(|e| column("role", e))?;

        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("record {id}: timestamp: {e}")))?;
        let tags: Vec<String> = serde_json::from_str(&tags_json)
            .map_err(|e| StoreError::Corrupt(format!("record {id}: tags: {e}")))?;
        let embedding = blob
            .as_deref()
            .map(|b| Self::blob_to_embedding(id, b))
            .transpose()?;

        Ok(MemoryRecord {
            id,
            timestamp,
            source,
            text,
            embedding,
            tags,
            session_id,
            role,
        })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, mut record: NewRecord) -> Result<MemoryRecord, StoreError> {
        // Stored precision is microseconds; hand back exactly what `get` will read.
        let timestamp = record.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(6);
        record.timestamp = Some(timestamp);

        let tags_json = serde_json::to_string(&record.tags)
            .map_err(|e| StoreError::Io(format!("Tags serialization: {e}")))?;
        let embedding_blob = record.embedding.as_deref().map(Self::embedding_to_blob);

        let result = sqlx::query(
            r#"
            INSERT INTO records (timestamp, source, text, embedding, tags, session_id, role)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Self::format_timestamp(&timestamp))
        .bind(&record.source)
        .bind(&record.text)
        .bind(embedding_blob.as_deref())
        .bind(&tags_json)
        .bind(record.session_id.as_deref())
        .bind(record.role.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Io(format!("INSERT failed: {e}")))?;

        let id = result.last_insert_rowid() as RecordId;
        debug!(id, "Stored record");
        Ok(record.commit(id))
    }

    async fn get(&self, id: RecordId) -> Result<Option<MemoryRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM records WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("GET by id: {e}")))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM records ORDER BY id DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("List recent: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn embedded(&self) -> Result<Vec<MemoryRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM records WHERE embedding IS NOT NULL ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Vector scan: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn session(&self, session_id: &str, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM records WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2")
                .bind(session_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Query(format!("Session history: {e}")))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecordId>, StoreError> {
        let cutoff = Self::format_timestamp(&cutoff);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Io(format!("Begin transaction: {e}")))?;

        let rows = sqlx::query("SELECT id FROM records WHERE timestamp < ?1 ORDER BY id")
            .bind(&cutoff)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(format!("Expired scan: {e}")))?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id").map(|id| id as RecordId))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Query(format!("id column: {e}")))?;

        sqlx::query("DELETE FROM records WHERE timestamp < ?1")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Io(format!("DELETE failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Io(format!("Commit failed: {e}")))?;

        Ok(ids)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::Query(format!("cnt column: {e}")))?;

        Ok(cnt as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn test_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn append_and_get_round_trip() {
        let db = test_store().await;
        let record = db
            .append(
                NewRecord::new("Rust is a systems programming language", "system")
                    .with_tags(["alpha", "beta", "gamma"])
                    .with_embedding(vec![0.1, 0.2, 0.3, 0.4]),
            )
            .await
            .unwrap();
        assert_eq!(record.id, 1);

        let fetched = db.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        let emb = fetched.embedding.unwrap();
        assert!((emb[3] - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn list_recent_is_newest_first() {
        let db = test_store().await;
        for text in ["A", "B", "C"] {
            db.append(NewRecord::new(text, "system")).await.unwrap();
        }
        let texts: Vec<_> = db
            .list_recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["C", "B"]);
    }

    #[tokio::test]
    async fn delete_older_than_respects_boundary() {
        let db = test_store().await;
        let cutoff = (Utc::now() - Duration::days(2)).trunc_subsecs(6);
        db.append(NewRecord::new("old", "system").at(cutoff - Duration::seconds(1)))
            .await
            .unwrap();
        db.append(NewRecord::new("edge", "system").at(cutoff))
            .await
            .unwrap();
        db.append(NewRecord::new("new", "system")).await.unwrap();

        let removed = db.delete_older_than(cutoff).await.unwrap();
        assert_eq!(removed, vec![1]);
        assert_eq!(db.count().await.unwrap(), 2);
        assert!(db.get(2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let db = test_store().await;
        let old = Utc::now() - Duration::days(90);
        db.append(NewRecord::new("a", "system").at(old)).await.unwrap();
        db.append(NewRecord::new("b", "system").at(old)).await.unwrap();
        db.delete_older_than(Utc::now()).await.unwrap();

        let fresh = db.append(NewRecord::new("c", "system")).await.unwrap();
        assert_eq!(fresh.id, 3);
    }

    #[tokio::test]
    async fn embedded_and_session_queries() {
        let db = test_store().await;
        db.append(NewRecord::new("fact", "system").with_embedding(vec![1.0, 0.0]))
            .await
            .unwrap();
        db.append(NewRecord::new("m1", "chat").with_session("chat", "user"))
            .await
            .unwrap();
        db.append(NewRecord::new("a1", "chat").with_session("chat", "assistant"))
            .await
            .unwrap();

        let embedded = db.embedded().await.unwrap();
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].text, "fact");

        let history = db.session("chat", 200).await.unwrap();
        let roles: Vec<_> = history.iter().filter_map(|r| r.role.as_deref()).collect();
        assert_eq!(roles, vec!["assistant", "user"]);
        assert!(db.session("other", 200).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.sqlite");

        let id = {
            let db = SqliteStore::new(&path).await.unwrap();
            db.append(NewRecord::new("durable", "system")).await.unwrap().id
        };

        let db = SqliteStore::new(&path).await.unwrap();
        assert_eq!(db.get(id).await.unwrap().unwrap().text, "durable");
    }

    #[test]
    fn timestamps_sort_as_strings() {
        let a = Utc::now();
        let b = a + Duration::milliseconds(1500);
        assert!(SqliteStore::format_timestamp(&a) < SqliteStore::format_timestamp(&b));
    }

    #[test]
    fn malformed_blob_is_corrupt() {
        assert!(matches!(
            SqliteStore::blob_to_embedding(1, &[0, 1, 2]),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn backend_name() {
        assert_eq!(test_store().await.name(), "sqlite");
    }
}
