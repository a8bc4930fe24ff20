//! crates/flashread_core/src/testing.rs
//!
//! In-memory fake ports for exercising the sync coordinator and stats
//! engine without a database or network. Compiled for this crate's unit
//! tests and, behind the `test_utils` feature, for downstream crate tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    DailyStats, Document, ExportBundle, LifetimeStats, MetaRecord, NewRemoteDocument,
    RemoteDocument, RemoteSession, RemoteStats, StreakRecord, EXPORT_VERSION,
};
use crate::ports::{Clock, LocalStore, PortError, PortResult, RemoteStore};

/// A clock whose time only moves when a test says so.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory `LocalStore` with the same merge semantics as the SQLite
/// adapter. Locks are never held across awaits.
#[derive(Default)]
pub struct MemoryLocalStore {
    pub documents: Mutex<Vec<Document>>,
    pub stats: Mutex<BTreeMap<NaiveDate, DailyStats>>,
    pub lifetime: Mutex<Option<LifetimeStats>>,
    pub streak: Mutex<Option<StreakRecord>>,
    pub migrated: Mutex<bool>,
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn save_document(&self, doc: &Document) -> PortResult<()> {
        let mut docs = self.documents.lock().unwrap();
        if let Some(existing) = docs.iter_mut().find(|d| d.id == doc.id) {
            *existing = doc.clone();
        } else {
            docs.push(doc.clone());
        }
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> PortResult<Option<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn all_documents(&self) -> PortResult<Vec<Document>> {
        let mut docs = self.documents.lock().unwrap().clone();
        docs.sort_by(|a, b| b.last_read_at.cmp(&a.last_read_at));
        Ok(docs)
    }

    async fn delete_document(&self, id: Uuid) -> PortResult<()> {
        self.documents.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }

    async fn get_document_by_fingerprint(&self, fingerprint: &str) -> PortResult<Option<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.fingerprint.as_deref() == Some(fingerprint))
            .cloned())
    }

    async fn update_progress(
        &self,
        id: Uuid,
        bookmark_index: u32,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut docs = self.documents.lock().unwrap();
        if let Some(doc) = docs.iter_mut().find(|d| d.id == id) {
            doc.bookmark_index = bookmark_index;
            doc.last_read_at = at;
        }
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
        let mut stats = self.stats.lock().unwrap();
        let day = stats.entry(date).or_insert_with(|| DailyStats::empty(date));
        crate::stats::accumulate_session(day, words_read, duration_ms, avg_wpm, completed);
        drop(stats);

        let mut lifetime = self.lifetime.lock().unwrap();
        let aggregate = lifetime.get_or_insert_with(LifetimeStats::default);
        aggregate.total_words_read += u64::from(words_read);
        if completed {
            aggregate.total_documents_completed += 1;
        }
        Ok(())
    }

    async fn daily_stats(&self, date: NaiveDate) -> PortResult<Option<DailyStats>> {
        Ok(self.stats.lock().unwrap().get(&date).cloned())
    }

    async fn stats_range(&self, start: NaiveDate, end: NaiveDate) -> PortResult<Vec<DailyStats>> {
        Ok(self
            .stats
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.date >= start && s.date <= end)
            .cloned()
            .collect())
    }

    async fn lifetime_stats(&self) -> PortResult<Option<LifetimeStats>> {
        Ok(self.lifetime.lock().unwrap().clone())
    }

    async fn save_lifetime(&self, lifetime: &LifetimeStats) -> PortResult<()> {
        *self.lifetime.lock().unwrap() = Some(lifetime.clone());
        Ok(())
    }

    async fn streak(&self) -> PortResult<Option<StreakRecord>> {
        Ok(self.streak.lock().unwrap().clone())
    }

    async fn save_streak(&self, streak: &StreakRecord) -> PortResult<()> {
        *self.streak.lock().unwrap() = Some(streak.clone());
        Ok(())
    }

    async fn update_streak(&self, today: NaiveDate) -> PortResult<StreakRecord> {
        let mut slot = self.streak.lock().unwrap();
        let updated = crate::stats::advance_streak(slot.take(), today);
        *slot = Some(updated.clone());
        Ok(updated)
    }

    async fn activate_streak_freeze(&self, at: DateTime<Utc>) -> PortResult<StreakRecord> {
        let mut slot = self.streak.lock().unwrap();
        let mut streak = slot.take().unwrap_or_default();
        streak.streak_freeze_active = true;
        streak.streak_freeze_used_at = Some(at);
        *slot = Some(streak.clone());
        Ok(streak)
    }

    async fn is_legacy_migrated(&self) -> PortResult<bool> {
        Ok(*self.migrated.lock().unwrap())
    }

    async fn set_legacy_migrated(&self) -> PortResult<()> {
        *self.migrated.lock().unwrap() = true;
        Ok(())
    }

    async fn export_all(&self) -> PortResult<ExportBundle> {
        let mut meta = Vec::new();
        if let Some(lifetime) = self.lifetime.lock().unwrap().clone() {
            meta.push(MetaRecord::Lifetime(lifetime));
        }
        if let Some(streak) = self.streak.lock().unwrap().clone() {
            meta.push(MetaRecord::Streak(streak));
        }
        Ok(ExportBundle {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            documents: self.documents.lock().unwrap().clone(),
            stats: self.stats.lock().unwrap().values().cloned().collect(),
            meta,
        })
    }

    async fn import_all(&self, bundle: &ExportBundle) -> PortResult<()> {
        if bundle.version != EXPORT_VERSION {
            return Err(PortError::InvalidInput(format!(
                "Unsupported backup format version {}",
                bundle.version
            )));
        }
        for doc in &bundle.documents {
            let existing = match &doc.fingerprint {
                Some(fp) => self.get_document_by_fingerprint(fp).await?,
                None => None,
            };
            match existing {
                None => {
                    let mut incoming = doc.clone();
                    incoming.remote_id = None;
                    self.save_document(&incoming).await?;
                }
                Some(mut current) if doc.bookmark_index > current.bookmark_index => {
                    current.bookmark_index = doc.bookmark_index;
                    current.last_read_at = doc.last_read_at;
                    self.save_document(&current).await?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// In-memory `RemoteStore`. `fail_listing` simulates a transport outage on
/// the document-listing path.
#[derive(Default)]
pub struct MemoryRemoteStore {
    pub unavailable: bool,
    pub documents: Mutex<Vec<RemoteDocument>>,
    pub stats: Mutex<Option<RemoteStats>>,
    pub sessions: Mutex<Vec<RemoteSession>>,
    pub fail_listing: AtomicBool,
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn list_documents(&self) -> PortResult<Vec<RemoteDocument>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("listing failed".to_string()));
        }
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn create_document(&self, doc: &NewRemoteDocument) -> PortResult<RemoteDocument> {
        let created = RemoteDocument {
            id: Uuid::new_v4().to_string(),
            title: Some(doc.title.clone()),
            fingerprint: doc.fingerprint.clone(),
            total_words: Some(doc.total_words),
            bookmark_index: Some(doc.bookmark_index),
            created_at: Some(Utc::now()),
            last_read_at: Some(Utc::now()),
            content: None,
        };
        self.documents.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_progress(
        &self,
        remote_id: &str,
        bookmark_index: u32,
        total_words: u32,
    ) -> PortResult<()> {
        let mut docs = self.documents.lock().unwrap();
        if let Some(doc) = docs.iter_mut().find(|d| d.id == remote_id) {
            doc.bookmark_index = Some(bookmark_index);
            doc.total_words = Some(total_words);
            doc.last_read_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_fingerprint(&self, remote_id: &str, fingerprint: &str) -> PortResult<()> {
        let mut docs = self.documents.lock().unwrap();
        if let Some(doc) = docs.iter_mut().find(|d| d.id == remote_id) {
            doc.fingerprint = Some(fingerprint.to_string());
        }
        Ok(())
    }

    async fn delete_document(&self, remote_id: &str) -> PortResult<()> {
        self.documents.lock().unwrap().retain(|d| d.id != remote_id);
        Ok(())
    }

    async fn fetch_stats(&self) -> PortResult<Option<RemoteStats>> {
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn push_stats(&self, stats: &RemoteStats) -> PortResult<()> {
        *self.stats.lock().unwrap() = Some(stats.clone());
        Ok(())
    }

    async fn push_session(&self, session: &RemoteSession) -> PortResult<()> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }
}
