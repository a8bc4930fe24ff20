//! crates/flashread_core/src/sync.rs
//!
//! Bidirectional reconciliation between the authoritative local store and
//! the metadata-only remote store. Sync is best-effort and safe to retry:
//! every step's failure is caught and logged, and the run returns whatever
//! "needs re-upload" entries it has accumulated.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Document, DocumentSource, NewRemoteDocument, RemoteStats, ReuploadRequest};
use crate::fingerprint;
use crate::ports::{LocalStore, PortResult, RemoteStore};

pub struct SyncCoordinator {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
}

impl SyncCoordinator {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { local, remote }
    }

    /// Runs a full reconciliation: legacy migration, pull, push, stats
    /// merge, in that order. A no-op without a signed-in remote. Returns
    /// the remote documents that have no content on this device.
    pub async fn sync_all(&self) -> Vec<ReuploadRequest> {
        if !self.remote.is_available() {
            return Vec::new();
        }

        if let Err(e) = self.migrate_legacy().await {
            warn!("Sync: legacy migration failed: {e}");
        }

        let needs_reupload = match self.sync_documents_down().await {
            Ok(requests) => requests,
            Err(e) => {
                warn!("Sync: pull failed: {e}");
                Vec::new()
            }
        };

        if let Err(e) = self.sync_documents_up().await {
            warn!("Sync: push failed: {e}");
        }

        if let Err(e) = self.sync_stats().await {
            warn!("Sync: stats merge failed: {e}");
        }

        needs_reupload
    }

    /// One-time migration for remote records written before fingerprinting:
    /// any record still carrying full content but no fingerprint is
    /// fingerprinted, merged into the local store, and back-filled remotely.
    async fn migrate_legacy(&self) -> PortResult<()> {
        if self.local.is_legacy_migrated().await? {
            return Ok(());
        }

        for rdoc in self.remote.list_documents().await? {
            let Some(content) = rdoc.content.as_deref().filter(|c| !c.is_empty()) else {
                continue;
            };
            if rdoc.fingerprint.is_some() {
                continue;
            }

            let fp = fingerprint::fingerprint_text(content);
            match self.local.get_document_by_fingerprint(&fp).await? {
                None => {
                    let words = crate::parser::parse_text(content);
                    let now = Utc::now();
                    let doc = Document {
                        id: Uuid::new_v4(),
                        title: rdoc.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                        content: content.to_string(),
                        fingerprint: Some(fp.clone()),
                        total_words: rdoc.total_words.unwrap_or(words.len() as u32),
                        bookmark_index: rdoc.bookmark_index.unwrap_or(0),
                        source: DocumentSource::Upload,
                        created_at: rdoc.created_at.unwrap_or(now),
                        last_read_at: rdoc.last_read_at.unwrap_or(now),
                        remote_id: Some(rdoc.id.clone()),
                        is_ghost: false,
                    };
                    self.local.save_document(&doc).await?;
                }
                Some(mut existing) => {
                    existing.remote_id = Some(rdoc.id.clone());
                    if let Some(remote_index) = rdoc.bookmark_index {
                        if remote_index > existing.bookmark_index {
                            existing.bookmark_index = remote_index;
                        }
                    }
                    self.local.save_document(&existing).await?;
                }
            }

            if let Err(e) = self.remote.set_fingerprint(&rdoc.id, &fp).await {
                warn!("Sync: could not back-fill fingerprint on {}: {e}", rdoc.id);
            }
        }

        self.local.set_legacy_migrated().await
    }

    /// Pulls remote metadata and merges it into the local store. A remote
    /// record with no local counterpart is materialized as a ghost document
    /// and reported for re-upload. The remote bookmark is adopted only when
    /// strictly ahead of the local one.
    async fn sync_documents_down(&self) -> PortResult<Vec<ReuploadRequest>> {
        let remote_docs = self.remote.list_documents().await?;
        if remote_docs.is_empty() {
            return Ok(Vec::new());
        }
        info!("Sync: {} remote document(s)", remote_docs.len());

        let mut locals = self.local.all_documents().await?;
        let mut needs_reupload = Vec::new();

        for rdoc in remote_docs {
            let matched = locals
                .iter()
                .position(|d| d.remote_id.as_deref() == Some(rdoc.id.as_str()))
                .or_else(|| {
                    rdoc.fingerprint.as_deref().and_then(|fp| {
                        locals
                            .iter()
                            .position(|d| d.fingerprint.as_deref() == Some(fp))
                    })
                });

            match matched {
                Some(index) => {
                    let doc = &mut locals[index];
                    doc.remote_id = Some(rdoc.id.clone());
                    let remote_index = rdoc.bookmark_index.unwrap_or(0);
                    if remote_index > doc.bookmark_index {
                        doc.bookmark_index = remote_index;
                        if let Some(at) = rdoc.last_read_at {
                            doc.last_read_at = at;
                        }
                    }
                    if doc.is_ghost {
                        // Linked again on this device; content still has to
                        // be re-supplied separately.
                        doc.is_ghost = false;
                    }
                    let updated = doc.clone();
                    self.local.save_document(&updated).await?;
                }
                None => {
                    let now = Utc::now();
                    let ghost = Document {
                        id: Uuid::new_v4(),
                        title: rdoc.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                        content: String::new(),
                        fingerprint: rdoc.fingerprint.clone(),
                        total_words: rdoc.total_words.unwrap_or(0),
                        bookmark_index: rdoc.bookmark_index.unwrap_or(0),
                        source: DocumentSource::Sync,
                        created_at: rdoc.created_at.unwrap_or(now),
                        last_read_at: rdoc.last_read_at.unwrap_or(now),
                        remote_id: Some(rdoc.id.clone()),
                        is_ghost: true,
                    };
                    self.local.save_document(&ghost).await?;
                    info!(
                        "Sync: materialized ghost \"{}\" at {}/{}",
                        ghost.title, ghost.bookmark_index, ghost.total_words
                    );
                    needs_reupload.push(ReuploadRequest {
                        remote_id: rdoc.id,
                        title: ghost.title.clone(),
                        fingerprint: ghost.fingerprint.clone(),
                        bookmark_index: ghost.bookmark_index,
                        total_words: ghost.total_words,
                    });
                    locals.push(ghost);
                }
            }
        }

        Ok(needs_reupload)
    }

    /// Pushes every local document: linked records get the local bookmark
    /// unconditionally; unlinked ones are created remotely and the returned
    /// identifier is persisted locally.
    async fn sync_documents_up(&self) -> PortResult<()> {
        for doc in self.local.all_documents().await? {
            self.push_document(&doc).await?;
        }
        Ok(())
    }

    /// Single-document variant of the push step, used right after local
    /// creation when already signed in. A no-op when signed out.
    pub async fn sync_document(&self, doc: &Document) -> PortResult<()> {
        if !self.remote.is_available() {
            return Ok(());
        }
        self.push_document(doc).await
    }

    async fn push_document(&self, doc: &Document) -> PortResult<()> {
        match &doc.remote_id {
            Some(remote_id) => {
                self.remote
                    .update_progress(remote_id, doc.bookmark_index, doc.total_words)
                    .await
            }
            None => {
                let created = self
                    .remote
                    .create_document(&NewRemoteDocument {
                        title: doc.title.clone(),
                        fingerprint: doc.fingerprint.clone(),
                        total_words: doc.total_words,
                        bookmark_index: doc.bookmark_index,
                    })
                    .await?;
                let mut linked = doc.clone();
                linked.remote_id = Some(created.id);
                self.local.save_document(&linked).await
            }
        }
    }

    /// Merges aggregate stats field-by-field, adopting whichever side is
    /// higher, then pushes the merged local values to the remote.
    async fn sync_stats(&self) -> PortResult<()> {
        if let Some(remote) = self.remote.fetch_stats().await? {
            let mut streak = self.local.streak().await?.unwrap_or_default();
            if remote.current_streak > streak.current_streak {
                streak.current_streak = remote.current_streak;
                if streak.last_read_date.is_none() {
                    streak.last_read_date = remote.last_read_date;
                }
                self.local.save_streak(&streak).await?;
            }

            let mut lifetime = self.local.lifetime_stats().await?.unwrap_or_default();
            let mut changed = false;
            if remote.total_words_read > lifetime.total_words_read {
                lifetime.total_words_read = remote.total_words_read;
                changed = true;
            }
            if remote.total_documents_completed > lifetime.total_documents_completed {
                lifetime.total_documents_completed = remote.total_documents_completed;
                changed = true;
            }
            if changed {
                self.local.save_lifetime(&lifetime).await?;
            }
        }

        let streak = self.local.streak().await?.unwrap_or_default();
        let lifetime = self.local.lifetime_stats().await?.unwrap_or_default();
        self.remote
            .push_stats(&RemoteStats {
                current_streak: streak.current_streak,
                last_read_date: streak.last_read_date,
                streak_freeze_active: streak.streak_freeze_active,
                streak_freeze_used_at: streak.streak_freeze_used_at,
                total_words_read: lifetime.total_words_read,
                total_documents_completed: lifetime.total_documents_completed,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifetimeStats, RemoteDocument, StreakRecord};
    use crate::ports::LocalStore;
    use crate::testing::{MemoryLocalStore, MemoryRemoteStore};
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;

    fn remote_doc(id: &str, fingerprint: Option<&str>, bookmark: u32, total: u32) -> RemoteDocument {
        RemoteDocument {
            id: id.to_string(),
            title: Some(format!("doc {id}")),
            fingerprint: fingerprint.map(str::to_string),
            total_words: Some(total),
            bookmark_index: Some(bookmark),
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            last_read_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            content: None,
        }
    }

    fn local_doc(content: &str) -> Document {
        Document::from_content("local", content, DocumentSource::Paste, Utc::now())
    }

    fn coordinator(
        local: &Arc<MemoryLocalStore>,
        remote: &Arc<MemoryRemoteStore>,
    ) -> SyncCoordinator {
        SyncCoordinator::new(local.clone(), remote.clone())
    }

    #[tokio::test]
    async fn sync_is_a_no_op_when_signed_out() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore {
            unavailable: true,
            ..MemoryRemoteStore::default()
        });
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r1", Some("fp"), 10, 100));

        let reupload = coordinator(&local, &remote).sync_all().await;
        assert!(reupload.is_empty());
        assert!(local.documents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmatched_remote_document_becomes_a_ghost() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r1", Some("fp-1"), 120, 500));

        let reupload = coordinator(&local, &remote).sync_all().await;

        assert_eq!(reupload.len(), 1);
        assert_eq!(reupload[0].remote_id, "r1");
        assert_eq!(reupload[0].bookmark_index, 120);

        let docs = local.documents.lock().unwrap();
        assert_eq!(docs.len(), 1);
        let ghost = &docs[0];
        assert!(ghost.is_ghost);
        assert!(ghost.content.is_empty());
        assert_eq!(ghost.bookmark_index, 120);
        assert_eq!(ghost.total_words, 500);
        assert_eq!(ghost.source, DocumentSource::Sync);
        assert_eq!(ghost.remote_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn remote_bookmark_wins_only_when_strictly_ahead() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());

        let mut ahead = local_doc("alpha beta gamma delta");
        ahead.bookmark_index = 200;
        ahead.remote_id = Some("r-ahead".to_string());
        local.save_document(&ahead).await.unwrap();
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r-ahead", None, 100, 400));

        let mut behind = local_doc("one two three four");
        behind.bookmark_index = 50;
        behind.remote_id = Some("r-behind".to_string());
        local.save_document(&behind).await.unwrap();
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r-behind", None, 300, 400));

        coordinator(&local, &remote).sync_all().await;

        let ahead_after = local.get_document(ahead.id).await.unwrap().unwrap();
        assert_eq!(ahead_after.bookmark_index, 200);
        let behind_after = local.get_document(behind.id).await.unwrap().unwrap();
        assert_eq!(behind_after.bookmark_index, 300);

        // Push made the remote adopt the local positions unconditionally.
        let remote_docs = remote.documents.lock().unwrap();
        let r_ahead = remote_docs.iter().find(|d| d.id == "r-ahead").unwrap();
        assert_eq!(r_ahead.bookmark_index, Some(200));
    }

    #[tokio::test]
    async fn bookmarks_never_decrease_across_a_run() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());

        let mut doc = local_doc("a b c d e f g h");
        doc.bookmark_index = 7;
        doc.remote_id = Some("r1".to_string());
        local.save_document(&doc).await.unwrap();
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r1", None, 3, 8));

        let sync = coordinator(&local, &remote);
        for _ in 0..3 {
            sync.sync_all().await;
            let after = local.get_document(doc.id).await.unwrap().unwrap();
            assert_eq!(after.bookmark_index, 7);
        }
    }

    #[tokio::test]
    async fn fingerprint_match_links_an_unlinked_local_document() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());

        let doc = local_doc("shared words in both stores");
        let fp = doc.fingerprint.clone().unwrap();
        local.save_document(&doc).await.unwrap();
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r9", Some(&fp), 2, 5));

        let reupload = coordinator(&local, &remote).sync_all().await;
        assert!(reupload.is_empty());

        let after = local.get_document(doc.id).await.unwrap().unwrap();
        assert_eq!(after.remote_id.as_deref(), Some("r9"));
        assert_eq!(after.bookmark_index, 2);
    }

    #[tokio::test]
    async fn unlinked_local_documents_are_created_remotely() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        let doc = local_doc("brand new local text");
        local.save_document(&doc).await.unwrap();

        coordinator(&local, &remote).sync_all().await;

        let after = local.get_document(doc.id).await.unwrap().unwrap();
        let remote_id = after.remote_id.expect("linked after push");
        let remote_docs = remote.documents.lock().unwrap();
        let created = remote_docs.iter().find(|d| d.id == remote_id).unwrap();
        assert_eq!(created.fingerprint, doc.fingerprint);
        assert_eq!(created.total_words, Some(doc.total_words));
    }

    #[tokio::test]
    async fn legacy_content_rows_are_migrated_once() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        {
            let mut docs = remote.documents.lock().unwrap();
            let mut legacy = remote_doc("old-1", None, 40, 0);
            legacy.content = Some("the quick brown fox jumps over the lazy dog".to_string());
            legacy.total_words = None;
            docs.push(legacy);
        }

        let sync = coordinator(&local, &remote);
        sync.sync_all().await;

        let docs = local.documents.lock().unwrap();
        assert_eq!(docs.len(), 1);
        let migrated = &docs[0];
        assert_eq!(migrated.total_words, 9);
        assert_eq!(migrated.bookmark_index, 40);
        assert!(migrated.fingerprint.is_some());
        assert_eq!(migrated.remote_id.as_deref(), Some("old-1"));
        drop(docs);

        // The remote record was back-filled with the fingerprint.
        let remote_docs = remote.documents.lock().unwrap();
        assert!(remote_docs[0].fingerprint.is_some());
        drop(remote_docs);

        // Second run: the migration flag prevents re-processing.
        assert!(local.is_legacy_migrated().await.unwrap());
        sync.sync_all().await;
        assert_eq!(local.documents.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stats_merge_adopts_the_higher_value_per_field() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());

        local
            .save_streak(&StreakRecord {
                current_streak: 3,
                last_read_date: None,
                streak_freeze_active: false,
                streak_freeze_used_at: None,
            })
            .await
            .unwrap();
        local
            .save_lifetime(&LifetimeStats {
                total_words_read: 10_000,
                total_documents_completed: 2,
            })
            .await
            .unwrap();
        *remote.stats.lock().unwrap() = Some(RemoteStats {
            current_streak: 5,
            total_words_read: 4_000,
            total_documents_completed: 7,
            ..RemoteStats::default()
        });

        coordinator(&local, &remote).sync_all().await;

        let streak = local.streak.lock().unwrap().clone().unwrap();
        assert_eq!(streak.current_streak, 5);
        let lifetime = local.lifetime.lock().unwrap().clone().unwrap();
        assert_eq!(lifetime.total_words_read, 10_000);
        assert_eq!(lifetime.total_documents_completed, 7);

        let pushed = remote.stats.lock().unwrap().clone().unwrap();
        assert_eq!(pushed.current_streak, 5);
        assert_eq!(pushed.total_words_read, 10_000);
        assert_eq!(pushed.total_documents_completed, 7);
    }

    #[tokio::test]
    async fn a_failing_step_does_not_abort_the_run() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        remote.fail_listing.store(true, Ordering::SeqCst);

        let doc = local_doc("survives a broken pull");
        local.save_document(&doc).await.unwrap();

        let reupload = coordinator(&local, &remote).sync_all().await;
        assert!(reupload.is_empty());

        // The push step still ran: the local document was created remotely.
        assert_eq!(remote.documents.lock().unwrap().len(), 1);
        let after = local.get_document(doc.id).await.unwrap().unwrap();
        assert!(after.remote_id.is_some());
    }

    #[tokio::test]
    async fn sync_document_creates_or_updates_a_single_record() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        let sync = coordinator(&local, &remote);

        let doc = local_doc("standalone path");
        local.save_document(&doc).await.unwrap();
        sync.sync_document(&doc).await.unwrap();

        let linked = local.get_document(doc.id).await.unwrap().unwrap();
        let remote_id = linked.remote_id.clone().expect("created remotely");

        let mut advanced = linked.clone();
        advanced.bookmark_index = 2;
        local.save_document(&advanced).await.unwrap();
        sync.sync_document(&advanced).await.unwrap();

        let remote_docs = remote.documents.lock().unwrap();
        let record = remote_docs.iter().find(|d| d.id == remote_id).unwrap();
        assert_eq!(record.bookmark_index, Some(2));
        assert_eq!(remote_docs.len(), 1);
    }

    #[tokio::test]
    async fn second_run_relinks_a_ghost_instead_of_duplicating_it() {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        remote
            .documents
            .lock()
            .unwrap()
            .push(remote_doc("r1", Some("fp-1"), 80, 300));

        let sync = coordinator(&local, &remote);
        let first = sync.sync_all().await;
        assert_eq!(first.len(), 1);

        let second = sync.sync_all().await;
        assert!(second.is_empty());
        assert_eq!(local.documents.lock().unwrap().len(), 1);
    }
}
