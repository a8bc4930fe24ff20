//! crates/flashread_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like the
//! SQLite store or the remote metadata API.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    DailyStats, Document, ExportBundle, LifetimeStats, NewRemoteDocument, RemoteDocument,
    RemoteSession, RemoteStats, StreakRecord,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g.,
/// database, network, file parsing).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// Rejected input, surfaced to the user with its message.
    #[error("{0}")]
    InvalidInput(String),
    /// The backing service is absent or not signed in.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Local Store Port
//=========================================================================================

/// Authoritative persistent storage: documents, daily stats, and singleton
/// metadata (lifetime aggregate, streak record, legacy-migration flag).
///
/// Date- and time-dependent operations take the acting date/instant as a
/// parameter so the calendar rules stay deterministic under test.
#[async_trait]
pub trait LocalStore: Send + Sync {
    // --- Documents ---
    /// Upsert by id; idempotent.
    async fn save_document(&self, doc: &Document) -> PortResult<()>;
    async fn get_document(&self, id: Uuid) -> PortResult<Option<Document>>;
    /// All documents, most recently read first.
    async fn all_documents(&self) -> PortResult<Vec<Document>>;
    async fn delete_document(&self, id: Uuid) -> PortResult<()>;
    /// At most one match expected; uniqueness is best-effort, enforced by
    /// lookup-before-insert at the call sites.
    async fn get_document_by_fingerprint(&self, fingerprint: &str) -> PortResult<Option<Document>>;
    /// Sets the bookmark and refreshes `last_read_at`. A missing document is
    /// a no-op, not an error.
    async fn update_progress(&self, id: Uuid, bookmark_index: u32, at: DateTime<Utc>)
        -> PortResult<()>;

    // --- Stats ---
    /// Accumulates one finished session into the day's record (created
    /// lazily) and the lifetime aggregate.
    async fn record_reading_session(
        &self,
        date: NaiveDate,
        words_read: u32,
        duration_ms: u64,
        avg_wpm: u32,
        completed: bool,
    ) -> PortResult<()>;
    async fn daily_stats(&self, date: NaiveDate) -> PortResult<Option<DailyStats>>;
    /// Daily records with `start <= date <= end`.
    async fn stats_range(&self, start: NaiveDate, end: NaiveDate) -> PortResult<Vec<DailyStats>>;
    async fn lifetime_stats(&self) -> PortResult<Option<LifetimeStats>>;
    async fn save_lifetime(&self, lifetime: &LifetimeStats) -> PortResult<()>;

    // --- Streak ---
    async fn streak(&self) -> PortResult<Option<StreakRecord>>;
    async fn save_streak(&self, streak: &StreakRecord) -> PortResult<()>;
    /// Applies the consecutive-day rules for `today`; already counted today
    /// is a no-op.
    async fn update_streak(&self, today: NaiveDate) -> PortResult<StreakRecord>;
    /// Arms the one-time grace day; idempotent.
    async fn activate_streak_freeze(&self, at: DateTime<Utc>) -> PortResult<StreakRecord>;

    // --- Legacy migration flag ---
    async fn is_legacy_migrated(&self) -> PortResult<bool>;
    async fn set_legacy_migrated(&self) -> PortResult<()>;

    // --- Backup ---
    async fn export_all(&self) -> PortResult<ExportBundle>;
    /// Merge-import; rejects unsupported bundle versions before touching any
    /// state.
    async fn import_all(&self, bundle: &ExportBundle) -> PortResult<()>;
}

//=========================================================================================
// Remote Metadata Store Port
//=========================================================================================

/// Metadata-only cloud storage for a signed-in identity. Never holds
/// document content (legacy rows excepted, read-only).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether an authenticated identity is attached. `false` turns every
    /// sync into a no-op.
    fn is_available(&self) -> bool;

    async fn list_documents(&self) -> PortResult<Vec<RemoteDocument>>;
    async fn create_document(&self, doc: &NewRemoteDocument) -> PortResult<RemoteDocument>;
    /// Pushes a bookmark; the remote adopts it unconditionally.
    async fn update_progress(
        &self,
        remote_id: &str,
        bookmark_index: u32,
        total_words: u32,
    ) -> PortResult<()>;
    /// Back-fills the fingerprint on a legacy record.
    async fn set_fingerprint(&self, remote_id: &str, fingerprint: &str) -> PortResult<()>;
    async fn delete_document(&self, remote_id: &str) -> PortResult<()>;

    async fn fetch_stats(&self) -> PortResult<Option<RemoteStats>>;
    async fn push_stats(&self, stats: &RemoteStats) -> PortResult<()>;
    async fn push_session(&self, session: &RemoteSession) -> PortResult<()>;
}

//=========================================================================================
// Source Parsing Port
//=========================================================================================

/// Turns an uploaded file into an ordered word sequence, or rejects it with
/// an `InvalidInput` error (unsupported type, oversized, undecodable).
#[async_trait]
pub trait SourceParser: Send + Sync {
    async fn parse(&self, file_name: &str, bytes: &[u8]) -> PortResult<Vec<String>>;
}

//=========================================================================================
// Clock Port
//=========================================================================================

/// Injected time source; keeps streaks and session durations testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//=========================================================================================
// Null implementations
//=========================================================================================

/// Substituted when the persistence layer is absent or failed to open, so
/// the reading experience still functions ephemeral-only. Every operation
/// succeeds with an empty or default result.
pub struct NullLocalStore;

#[async_trait]
impl LocalStore for NullLocalStore {
    async fn save_document(&self, _doc: &Document) -> PortResult<()> {
        Ok(())
    }
    async fn get_document(&self, _id: Uuid) -> PortResult<Option<Document>> {
        Ok(None)
    }
    async fn all_documents(&self) -> PortResult<Vec<Document>> {
        Ok(Vec::new())
    }
    async fn delete_document(&self, _id: Uuid) -> PortResult<()> {
        Ok(())
    }
    async fn get_document_by_fingerprint(&self, _fingerprint: &str) -> PortResult<Option<Document>> {
        Ok(None)
    }
    async fn update_progress(
        &self,
        _id: Uuid,
        _bookmark_index: u32,
        _at: DateTime<Utc>,
    ) -> PortResult<()> {
        Ok(())
    }
    async fn record_reading_session(
        &self,
        _date: NaiveDate,
        _words_read: u32,
        _duration_ms: u64,
        _avg_wpm: u32,
        _completed: bool,
    ) -> PortResult<()> {
        Ok(())
    }
    async fn daily_stats(&self, _date: NaiveDate) -> PortResult<Option<DailyStats>> {
        Ok(None)
    }
    async fn stats_range(&self, _start: NaiveDate, _end: NaiveDate) -> PortResult<Vec<DailyStats>> {
        Ok(Vec::new())
    }
    async fn lifetime_stats(&self) -> PortResult<Option<LifetimeStats>> {
        Ok(None)
    }
    async fn save_lifetime(&self, _lifetime: &LifetimeStats) -> PortResult<()> {
        Ok(())
    }
    async fn streak(&self) -> PortResult<Option<StreakRecord>> {
        Ok(None)
    }
    async fn save_streak(&self, _streak: &StreakRecord) -> PortResult<()> {
        Ok(())
    }
    async fn update_streak(&self, today: NaiveDate) -> PortResult<StreakRecord> {
        Ok(StreakRecord {
            current_streak: 1,
            last_read_date: Some(today),
            ..StreakRecord::default()
        })
    }
    async fn activate_streak_freeze(&self, at: DateTime<Utc>) -> PortResult<StreakRecord> {
        Ok(StreakRecord {
            streak_freeze_active: true,
            streak_freeze_used_at: Some(at),
            ..StreakRecord::default()
        })
    }
    async fn is_legacy_migrated(&self) -> PortResult<bool> {
        Ok(true)
    }
    async fn set_legacy_migrated(&self) -> PortResult<()> {
        Ok(())
    }
    async fn export_all(&self) -> PortResult<ExportBundle> {
        Ok(ExportBundle {
            version: crate::domain::EXPORT_VERSION,
            exported_at: Utc::now(),
            documents: Vec::new(),
            stats: Vec::new(),
            meta: Vec::new(),
        })
    }
    async fn import_all(&self, _bundle: &ExportBundle) -> PortResult<()> {
        Ok(())
    }
}

/// Substituted when no identity is signed in. Reports unavailable; the sync
/// coordinator and stats engine skip remote work entirely, so the operation
/// methods are never reached in practice.
pub struct NullRemoteStore;

#[async_trait]
impl RemoteStore for NullRemoteStore {
    fn is_available(&self) -> bool {
        false
    }
    async fn list_documents(&self) -> PortResult<Vec<RemoteDocument>> {
        Ok(Vec::new())
    }
    async fn create_document(&self, _doc: &NewRemoteDocument) -> PortResult<RemoteDocument> {
        Err(PortError::Unavailable("not signed in".to_string()))
    }
    async fn update_progress(
        &self,
        _remote_id: &str,
        _bookmark_index: u32,
        _total_words: u32,
    ) -> PortResult<()> {
        Ok(())
    }
    async fn set_fingerprint(&self, _remote_id: &str, _fingerprint: &str) -> PortResult<()> {
        Ok(())
    }
    async fn delete_document(&self, _remote_id: &str) -> PortResult<()> {
        Ok(())
    }
    async fn fetch_stats(&self) -> PortResult<Option<RemoteStats>> {
        Ok(None)
    }
    async fn push_stats(&self, _stats: &RemoteStats) -> PortResult<()> {
        Ok(())
    }
    async fn push_session(&self, _session: &RemoteSession) -> PortResult<()> {
        Ok(())
    }
}
