//! services/api/src/adapters/store.rs
//!
//! This module contains the local storage adapter, which is the concrete
//! implementation of the `LocalStore` port from the `core` crate. It keeps
//! the authoritative copy of all app data in a SQLite database using `sqlx`:
//! documents, per-day stats, and singleton metadata rows (lifetime
//! aggregate, streak record, legacy-migration flag) stored as JSON values
//! under their keys.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use flashread_core::domain::{
    DailyStats, Document, DocumentSource, ExportBundle, LifetimeStats, MetaRecord, StreakRecord,
    EXPORT_VERSION,
};
use flashread_core::ports::{LocalStore, PortError, PortResult};
use flashread_core::stats::{accumulate_session, advance_streak};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use uuid::Uuid;

const META_LIFETIME: &str = "lifetime";
const META_STREAK: &str = "streak";
const META_LEGACY_MIGRATED: &str = "legacy_migrated";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A storage adapter that implements the `LocalStore` port on SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore` over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database file and brings the schema
    /// up to date.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn read_meta<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| PortError::Unexpected(e.to_string())),
            None => Ok(None),
        }
    }

    async fn write_meta<T: Serialize>(&self, key: &str, value: &T) -> PortResult<()> {
        let json = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: String,
    title: String,
    content: String,
    fingerprint: Option<String>,
    total_words: i64,
    bookmark_index: i64,
    source: String,
    created_at: DateTime<Utc>,
    last_read_at: DateTime<Utc>,
    remote_id: Option<String>,
    is_ghost: bool,
}

impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| PortError::Unexpected(format!("corrupt document id: {e}")))?;
        Ok(Document {
            id,
            title: self.title,
            content: self.content,
            fingerprint: self.fingerprint,
            total_words: self.total_words as u32,
            bookmark_index: self.bookmark_index as u32,
            source: source_from_str(&self.source),
            created_at: self.created_at,
            last_read_at: self.last_read_at,
            remote_id: self.remote_id,
            is_ghost: self.is_ghost,
        })
    }
}

#[derive(FromRow)]
struct DailyStatsRecord {
    date: NaiveDate,
    words_read: i64,
    reading_time_ms: i64,
    sessions_count: i64,
    avg_wpm: i64,
    documents_completed: i64,
}

impl DailyStatsRecord {
    fn to_domain(self) -> DailyStats {
        DailyStats {
            date: self.date,
            words_read: self.words_read as u64,
            reading_time_ms: self.reading_time_ms as u64,
            sessions_count: self.sessions_count as u32,
            avg_wpm: self.avg_wpm as u32,
            documents_completed: self.documents_completed as u32,
        }
    }
}

fn source_from_str(raw: &str) -> DocumentSource {
    match raw {
        "paste" => DocumentSource::Paste,
        "sync" => DocumentSource::Sync,
        _ => DocumentSource::Upload,
    }
}

fn source_to_str(source: DocumentSource) -> &'static str {
    match source {
        DocumentSource::Upload => "upload",
        DocumentSource::Paste => "paste",
        DocumentSource::Sync => "sync",
    }
}

const UPSERT_DOCUMENT_SQL: &str = "INSERT INTO documents \
     (id, title, content, fingerprint, total_words, bookmark_index, source, \
      created_at, last_read_at, remote_id, is_ghost) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
     ON CONFLICT(id) DO UPDATE SET \
        title = excluded.title, \
        content = excluded.content, \
        fingerprint = excluded.fingerprint, \
        total_words = excluded.total_words, \
        bookmark_index = excluded.bookmark_index, \
        source = excluded.source, \
        created_at = excluded.created_at, \
        last_read_at = excluded.last_read_at, \
        remote_id = excluded.remote_id, \
        is_ghost = excluded.is_ghost";

fn bind_document(doc: &Document) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(UPSERT_DOCUMENT_SQL)
        .bind(doc.id.to_string())
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(doc.fingerprint.clone())
        .bind(doc.total_words as i64)
        .bind(doc.bookmark_index as i64)
        .bind(source_to_str(doc.source))
        .bind(doc.created_at)
        .bind(doc.last_read_at)
        .bind(doc.remote_id.clone())
        .bind(doc.is_ghost)
}

const UPSERT_STATS_SQL: &str = "INSERT INTO stats \
     (date, words_read, reading_time_ms, sessions_count, avg_wpm, documents_completed) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT(date) DO UPDATE SET \
        words_read = excluded.words_read, \
        reading_time_ms = excluded.reading_time_ms, \
        sessions_count = excluded.sessions_count, \
        avg_wpm = excluded.avg_wpm, \
        documents_completed = excluded.documents_completed";

fn bind_stats(day: &DailyStats) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(UPSERT_STATS_SQL)
        .bind(day.date)
        .bind(day.words_read as i64)
        .bind(day.reading_time_ms as i64)
        .bind(day.sessions_count as i64)
        .bind(day.avg_wpm as i64)
        .bind(day.documents_completed as i64)
}

//=========================================================================================
// `LocalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LocalStore for SqliteStore {
    async fn save_document(&self, doc: &Document) -> PortResult<()> {
        bind_document(doc)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> PortResult<Option<Document>> {
        let record = sqlx::query_as::<_, DocumentRecord>("SELECT * FROM documents WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(DocumentRecord::to_domain).transpose()
    }

    async fn all_documents(&self) -> PortResult<Vec<Document>> {
        let records =
            sqlx::query_as::<_, DocumentRecord>("SELECT * FROM documents ORDER BY last_read_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        records.into_iter().map(DocumentRecord::to_domain).collect()
    }

    async fn delete_document(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_document_by_fingerprint(&self, fingerprint: &str) -> PortResult<Option<Document>> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT * FROM documents WHERE fingerprint = ?1 LIMIT 1",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(DocumentRecord::to_domain).transpose()
    }

    async fn update_progress(
        &self,
        id: Uuid,
        bookmark_index: u32,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Zero rows affected (unknown id) is deliberately not an error.
        sqlx::query("UPDATE documents SET bookmark_index = ?1, last_read_at = ?2 WHERE id = ?3")
            .bind(bookmark_index as i64)
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn record_reading_session(
        &self,
        date: NaiveDate,
        words_read: u32,
        duration_ms: u64,
        avg_wpm: u32,
        completed: bool,
    ) -> PortResult<()> {
        let mut day = self
            .daily_stats(date)
            .await?
            .unwrap_or_else(|| DailyStats::empty(date));
        accumulate_session(&mut day, words_read, duration_ms, avg_wpm, completed);
        bind_stats(&day)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut lifetime: LifetimeStats =
            self.read_meta(META_LIFETIME).await?.unwrap_or_default();
        lifetime.total_words_read += u64::from(words_read);
        if completed {
            lifetime.total_documents_completed += 1;
        }
        self.write_meta(META_LIFETIME, &lifetime).await
    }

    async fn daily_stats(&self, date: NaiveDate) -> PortResult<Option<DailyStats>> {
        let record = sqlx::query_as::<_, DailyStatsRecord>("SELECT * FROM stats WHERE date = ?1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(DailyStatsRecord::to_domain))
    }

    async fn stats_range(&self, start: NaiveDate, end: NaiveDate) -> PortResult<Vec<DailyStats>> {
        let records = sqlx::query_as::<_, DailyStatsRecord>(
            "SELECT * FROM stats WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(DailyStatsRecord::to_domain).collect())
    }

    async fn lifetime_stats(&self) -> PortResult<Option<LifetimeStats>> {
        self.read_meta(META_LIFETIME).await
    }

    async fn save_lifetime(&self, lifetime: &LifetimeStats) -> PortResult<()> {
        self.write_meta(META_LIFETIME, lifetime).await
    }

    async fn streak(&self) -> PortResult<Option<StreakRecord>> {
        self.read_meta(META_STREAK).await
    }

    async fn save_streak(&self, streak: &StreakRecord) -> PortResult<()> {
        self.write_meta(META_STREAK, streak).await
    }

    async fn update_streak(&self, today: NaiveDate) -> PortResult<StreakRecord> {
        let current: Option<StreakRecord> = self.read_meta(META_STREAK).await?;
        let updated = advance_streak(current, today);
        self.write_meta(META_STREAK, &updated).await?;
        Ok(updated)
    }

    async fn activate_streak_freeze(&self, at: DateTime<Utc>) -> PortResult<StreakRecord> {
        let mut streak: StreakRecord = self.read_meta(META_STREAK).await?.unwrap_or_default();
        streak.streak_freeze_active = true;
        streak.streak_freeze_used_at = Some(at);
        self.write_meta(META_STREAK, &streak).await?;
        Ok(streak)
    }

    async fn is_legacy_migrated(&self) -> PortResult<bool> {
        Ok(self.read_meta(META_LEGACY_MIGRATED).await?.unwrap_or(false))
    }

    async fn set_legacy_migrated(&self) -> PortResult<()> {
        self.write_meta(META_LEGACY_MIGRATED, &true).await
    }

    async fn export_all(&self) -> PortResult<ExportBundle> {
        let documents = self.all_documents().await?;
        let records = sqlx::query_as::<_, DailyStatsRecord>("SELECT * FROM stats ORDER BY date ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let stats = records.into_iter().map(DailyStatsRecord::to_domain).collect();

        let mut meta = Vec::new();
        if let Some(lifetime) = self.lifetime_stats().await? {
            meta.push(MetaRecord::Lifetime(lifetime));
        }
        if let Some(streak) = self.streak().await? {
            meta.push(MetaRecord::Streak(streak));
        }

        Ok(ExportBundle {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            documents,
            stats,
            meta,
        })
    }

    async fn import_all(&self, bundle: &ExportBundle) -> PortResult<()> {
        // Fail fast before any mutation.
        if bundle.version != EXPORT_VERSION {
            return Err(PortError::InvalidInput(format!(
                "Unsupported backup format version {}",
                bundle.version
            )));
        }

        // Documents merge by fingerprint: insert (with sync linkage
        // cleared), or keep the higher bookmark.
        for doc in &bundle.documents {
            let existing = match doc.fingerprint.as_deref() {
                Some(fp) => self.get_document_by_fingerprint(fp).await?,
                None => None,
            };
            match existing {
                None => {
                    let mut incoming = doc.clone();
                    incoming.remote_id = None;
                    self.save_document(&incoming).await?;
                }
                Some(mut current) => {
                    if doc.bookmark_index > current.bookmark_index {
                        current.bookmark_index = doc.bookmark_index;
                        current.last_read_at = doc.last_read_at;
                        self.save_document(&current).await?;
                    }
                }
            }
        }

        // Daily stats merge by date, taking the maximum of each additive
        // field; the day's running average stays as recorded locally.
        for stat in &bundle.stats {
            match self.daily_stats(stat.date).await? {
                None => {
                    bind_stats(stat).execute(&self.pool).await.map_err(unexpected)?;
                }
                Some(mut current) => {
                    current.words_read = current.words_read.max(stat.words_read);
                    current.reading_time_ms = current.reading_time_ms.max(stat.reading_time_ms);
                    current.sessions_count = current.sessions_count.max(stat.sessions_count);
                    current.documents_completed =
                        current.documents_completed.max(stat.documents_completed);
                    bind_stats(&current)
                        .execute(&self.pool)
                        .await
                        .map_err(unexpected)?;
                }
            }
        }

        // Metadata merges by taking the higher values.
        for record in &bundle.meta {
            match record {
                MetaRecord::Lifetime(incoming) => {
                    let mut lifetime: LifetimeStats =
                        self.read_meta(META_LIFETIME).await?.unwrap_or_default();
                    lifetime.total_words_read =
                        lifetime.total_words_read.max(incoming.total_words_read);
                    lifetime.total_documents_completed = lifetime
                        .total_documents_completed
                        .max(incoming.total_documents_completed);
                    self.write_meta(META_LIFETIME, &lifetime).await?;
                }
                MetaRecord::Streak(incoming) => {
                    let current: Option<StreakRecord> = self.read_meta(META_STREAK).await?;
                    let keep_incoming = current
                        .as_ref()
                        .map(|c| incoming.current_streak > c.current_streak)
                        .unwrap_or(true);
                    if keep_incoming {
                        self.write_meta(META_STREAK, incoming).await?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flashread_core::domain::DocumentSource;

    async fn memory_store() -> SqliteStore {
        // One never-reaped connection, or the in-memory database vanishes
        // between queries.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let store = SqliteStore::new(pool);
        store.run_migrations().await.expect("migrations");
        store
    }

    fn sample_doc(content: &str) -> Document {
        Document::from_content(
            "sample",
            content,
            DocumentSource::Upload,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn documents_round_trip_through_sqlite() {
        let store = memory_store().await;
        let mut doc = sample_doc("the quick brown fox");
        doc.bookmark_index = 2;
        doc.remote_id = Some("r-1".to_string());
        store.save_document(&doc).await.unwrap();

        let loaded = store.get_document(doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "sample");
        assert_eq!(loaded.content, "the quick brown fox");
        assert_eq!(loaded.total_words, 4);
        assert_eq!(loaded.bookmark_index, 2);
        assert_eq!(loaded.source, DocumentSource::Upload);
        assert_eq!(loaded.remote_id.as_deref(), Some("r-1"));
        assert!(!loaded.is_ghost);

        let by_fp = store
            .get_document_by_fingerprint(doc.fingerprint.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(by_fp.unwrap().id, doc.id);
    }

    #[tokio::test]
    async fn save_document_is_an_idempotent_upsert() {
        let store = memory_store().await;
        let mut doc = sample_doc("alpha beta");
        store.save_document(&doc).await.unwrap();
        doc.bookmark_index = 1;
        store.save_document(&doc).await.unwrap();

        let docs = store.all_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].bookmark_index, 1);
    }

    #[tokio::test]
    async fn update_progress_ignores_unknown_documents() {
        let store = memory_store().await;
        store
            .update_progress(Uuid::new_v4(), 10, Utc::now())
            .await
            .expect("must not fail for an absent id");
    }

    #[tokio::test]
    async fn update_progress_moves_bookmark_and_timestamp() {
        let store = memory_store().await;
        let doc = sample_doc("one two three four five");
        store.save_document(&doc).await.unwrap();

        let at = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        store.update_progress(doc.id, 3, at).await.unwrap();

        let loaded = store.get_document(doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.bookmark_index, 3);
        assert_eq!(loaded.last_read_at, at);
    }

    #[tokio::test]
    async fn documents_list_most_recently_read_first() {
        let store = memory_store().await;
        let mut older = sample_doc("older document text");
        older.last_read_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut newer = sample_doc("newer document text");
        newer.last_read_at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        store.save_document(&older).await.unwrap();
        store.save_document(&newer).await.unwrap();

        let docs = store.all_documents().await.unwrap();
        assert_eq!(docs[0].id, newer.id);
        assert_eq!(docs[1].id, older.id);
    }

    #[tokio::test]
    async fn reading_sessions_accumulate_into_day_and_lifetime() {
        let store = memory_store().await;
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        store
            .record_reading_session(date, 200, 60_000, 200, false)
            .await
            .unwrap();
        store
            .record_reading_session(date, 300, 60_000, 300, true)
            .await
            .unwrap();

        let day = store.daily_stats(date).await.unwrap().unwrap();
        assert_eq!(day.words_read, 500);
        assert_eq!(day.reading_time_ms, 120_000);
        assert_eq!(day.sessions_count, 2);
        assert_eq!(day.avg_wpm, 250);
        assert_eq!(day.documents_completed, 1);

        let lifetime = store.lifetime_stats().await.unwrap().unwrap();
        assert_eq!(lifetime.total_words_read, 500);
        assert_eq!(lifetime.total_documents_completed, 1);
    }

    #[tokio::test]
    async fn streak_progresses_and_consumes_the_freeze() {
        let store = memory_store().await;
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

        assert_eq!(store.update_streak(day(1)).await.unwrap().current_streak, 1);
        // Same day again: no-op.
        assert_eq!(store.update_streak(day(1)).await.unwrap().current_streak, 1);
        // Next day: increments.
        assert_eq!(store.update_streak(day(2)).await.unwrap().current_streak, 2);

        // Arm the freeze, skip a day, and the streak survives.
        store.activate_streak_freeze(Utc::now()).await.unwrap();
        let thawed = store.update_streak(day(4)).await.unwrap();
        assert_eq!(thawed.current_streak, 3);
        assert!(!thawed.streak_freeze_active);

        // Three silent days break it.
        assert_eq!(store.update_streak(day(7)).await.unwrap().current_streak, 1);
    }

    #[tokio::test]
    async fn export_then_import_reproduces_documents_and_bookmarks() {
        let store = memory_store().await;
        let mut doc_a = sample_doc("first exported document body");
        doc_a.bookmark_index = 3;
        doc_a.remote_id = Some("r-a".to_string());
        let mut doc_b = sample_doc("second exported document body");
        doc_b.bookmark_index = 1;
        store.save_document(&doc_a).await.unwrap();
        store.save_document(&doc_b).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        store
            .record_reading_session(date, 500, 120_000, 250, true)
            .await
            .unwrap();
        store.update_streak(date).await.unwrap();

        let bundle = store.export_all().await.unwrap();
        assert_eq!(bundle.version, EXPORT_VERSION);

        let fresh = memory_store().await;
        fresh.import_all(&bundle).await.unwrap();

        let docs = fresh.all_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        let restored_a = docs
            .iter()
            .find(|d| d.fingerprint == doc_a.fingerprint)
            .unwrap();
        assert_eq!(restored_a.bookmark_index, 3);
        // Inbound sync linkage is cleared on insert.
        assert!(restored_a.remote_id.is_none());

        let day = fresh.daily_stats(date).await.unwrap().unwrap();
        assert_eq!(day.words_read, 500);
        assert_eq!(fresh.streak().await.unwrap().unwrap().current_streak, 1);
        let lifetime = fresh.lifetime_stats().await.unwrap().unwrap();
        assert_eq!(lifetime.total_words_read, 500);
    }

    #[tokio::test]
    async fn import_rejects_unknown_versions_before_mutating() {
        let store = memory_store().await;
        let mut bundle = store.export_all().await.unwrap();
        bundle.version = 99;
        bundle.documents.push(sample_doc("should never land"));

        let err = store.import_all(&bundle).await.unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
        assert!(store.all_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_keeps_the_higher_bookmark_per_fingerprint() {
        let store = memory_store().await;
        let mut resident = sample_doc("shared content between devices");
        resident.bookmark_index = 10;
        store.save_document(&resident).await.unwrap();

        let mut ahead = resident.clone();
        ahead.id = Uuid::new_v4();
        ahead.bookmark_index = 25;
        let mut behind = resident.clone();
        behind.id = Uuid::new_v4();
        behind.bookmark_index = 4;

        let bundle = ExportBundle {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            documents: vec![ahead, behind],
            stats: Vec::new(),
            meta: Vec::new(),
        };
        store.import_all(&bundle).await.unwrap();

        let docs = store.all_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, resident.id);
        assert_eq!(docs[0].bookmark_index, 25);
    }

    #[tokio::test]
    async fn import_merges_stats_and_meta_by_maximum() {
        let store = memory_store().await;
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        store
            .record_reading_session(date, 100, 30_000, 200, false)
            .await
            .unwrap();
        store
            .save_streak(&StreakRecord {
                current_streak: 6,
                last_read_date: Some(date),
                ..StreakRecord::default()
            })
            .await
            .unwrap();

        let mut incoming_day = DailyStats::empty(date);
        incoming_day.words_read = 50;
        incoming_day.reading_time_ms = 90_000;
        incoming_day.sessions_count = 1;
        let bundle = ExportBundle {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            documents: Vec::new(),
            stats: vec![incoming_day],
            meta: vec![
                MetaRecord::Lifetime(LifetimeStats {
                    total_words_read: 90,
                    total_documents_completed: 3,
                }),
                MetaRecord::Streak(StreakRecord {
                    current_streak: 2,
                    last_read_date: Some(date),
                    ..StreakRecord::default()
                }),
            ],
        };
        store.import_all(&bundle).await.unwrap();

        let day = store.daily_stats(date).await.unwrap().unwrap();
        assert_eq!(day.words_read, 100); // local was higher
        assert_eq!(day.reading_time_ms, 90_000); // incoming was higher

        let lifetime = store.lifetime_stats().await.unwrap().unwrap();
        assert_eq!(lifetime.total_words_read, 100);
        assert_eq!(lifetime.total_documents_completed, 3);

        // Lower incoming streak does not replace the local one.
        assert_eq!(store.streak().await.unwrap().unwrap().current_streak, 6);
    }
}
