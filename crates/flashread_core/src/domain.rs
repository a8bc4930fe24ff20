//! crates/flashread_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format; the
//! serde derives exist because the export bundle and the crash buffer are
//! themselves specified as JSON documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::fingerprint;

/// The export bundle format version this build reads and writes.
pub const EXPORT_VERSION: u32 = 1;

/// Provenance of a document's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    Upload,
    Paste,
    Sync,
}

/// A document owned by the local store. The remote store mirrors its
/// metadata but never its `content`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    /// Full text. Empty for ghost documents.
    pub content: String,
    /// Content fingerprint used for cross-device matching. `None` only for
    /// ghosts whose remote record predates fingerprinting.
    pub fingerprint: Option<String>,
    pub total_words: u32,
    /// Last-read position, in `[0, total_words]`.
    pub bookmark_index: u32,
    pub source: DocumentSource,
    pub created_at: DateTime<Utc>,
    pub last_read_at: DateTime<Utc>,
    /// Foreign key into the remote metadata store; `None` means not yet
    /// synced.
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Remote metadata and a bookmark exist, but content must be re-supplied
    /// before reading can resume. Ghost implies `content` is empty.
    #[serde(default)]
    pub is_ghost: bool,
}

impl Document {
    /// Builds a new local document from raw text, computing the fingerprint
    /// and word count from its word sequence.
    pub fn from_content(
        title: &str,
        content: &str,
        source: DocumentSource,
        now: DateTime<Utc>,
    ) -> Self {
        let words = crate::parser::parse_text(content);
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            fingerprint: Some(fingerprint::fingerprint_words(&words)),
            total_words: words.len() as u32,
            bookmark_index: 0,
            source,
            created_at: now,
            last_read_at: now,
            remote_id: None,
            is_ghost: false,
        }
    }

    /// Attaches content to a ghost document, clearing the ghost flag
    /// permanently. The bookmark is left to the caller, which keeps the
    /// higher of the two positions.
    pub fn supply_content(&mut self, content: &str, total_words: u32) {
        self.content = content.to_string();
        self.total_words = total_words;
        self.is_ghost = false;
    }
}

/// Accumulated reading activity for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub words_read: u64,
    pub reading_time_ms: u64,
    pub sessions_count: u32,
    /// Running average across the day's sessions.
    pub avg_wpm: u32,
    pub documents_completed: u32,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            words_read: 0,
            reading_time_ms: 0,
            sessions_count: 0,
            avg_wpm: 0,
            documents_completed: 0,
        }
    }
}

/// Singleton lifetime aggregate. Fields only ever increase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    pub total_words_read: u64,
    pub total_documents_completed: u32,
}

/// Singleton streak record. A qualifying day is any session of at least
/// sixty seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current_streak: u32,
    pub last_read_date: Option<NaiveDate>,
    pub streak_freeze_active: bool,
    pub streak_freeze_used_at: Option<DateTime<Utc>>,
}

/// One entry of the export bundle's `meta` collection, discriminated by the
/// same `key` the local store indexes on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "key")]
pub enum MetaRecord {
    #[serde(rename = "lifetime")]
    Lifetime(LifetimeStats),
    #[serde(rename = "streak")]
    Streak(StreakRecord),
}

/// Versioned full-state backup document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub documents: Vec<Document>,
    pub stats: Vec<DailyStats>,
    pub meta: Vec<MetaRecord>,
}

/// Dashboard-ready aggregate assembled by the stats engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStats {
    pub current_streak: u32,
    pub streak_freeze_active: bool,
    pub total_words_read: u64,
    pub words_read_today: u64,
    pub documents_completed: u32,
    /// Trailing 7-calendar-day mean of each day's non-zero average WPM.
    pub average_wpm: u32,
}

/// A remote document whose content is missing on this device; the caller
/// should prompt the user to supply the original file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuploadRequest {
    pub remote_id: String,
    pub title: String,
    pub fingerprint: Option<String>,
    pub bookmark_index: u32,
    pub total_words: u32,
}

/// Single-slot crash-recovery buffer, overwritten at every flush and
/// replayed once on startup if fresh enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashBuffer {
    pub document_id: Uuid,
    pub index: u32,
    pub total: u32,
    pub timestamp: DateTime<Utc>,
}

//=========================================================================================
// Remote metadata store records (transport representation, snake_case)
//=========================================================================================

/// Document metadata as held by the remote store. Optional fields tolerate
/// legacy rows written before the current schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub total_words: Option<u32>,
    #[serde(default)]
    pub bookmark_index: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
    /// Present only on legacy rows that predate the metadata-only schema.
    /// Never written back.
    #[serde(default, skip_serializing)]
    pub content: Option<String>,
}

/// Payload for creating a remote document metadata record.
#[derive(Debug, Clone, Serialize)]
pub struct NewRemoteDocument {
    pub title: String,
    pub fingerprint: Option<String>,
    pub total_words: u32,
    pub bookmark_index: u32,
}

/// Aggregate stats record for a signed-in identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteStats {
    pub current_streak: u32,
    #[serde(default)]
    pub last_read_date: Option<NaiveDate>,
    #[serde(default)]
    pub streak_freeze_active: bool,
    #[serde(default)]
    pub streak_freeze_used_at: Option<DateTime<Utc>>,
    pub total_words_read: u64,
    pub total_documents_completed: u32,
}

/// Append-only per-session record pushed to the remote store.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteSession {
    pub words_read: u32,
    pub duration_seconds: u32,
    pub avg_wpm: u32,
    pub session_date: NaiveDate,
}
