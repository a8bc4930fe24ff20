//! services/api/src/checkpoint.rs
//!
//! Debounced bookmark persistence and the single-slot crash-recovery
//! buffer. Progress notifications arrive once per presented word; writing
//! each one through would hammer the store, so saves coalesce within a
//! settle window. Session end, pause, and seek boundaries flush
//! unconditionally, which bounds data loss on abrupt termination. Every
//! flush also writes the crash buffer synchronously; startup replays it
//! once if fresh enough and clears it regardless of outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use flashread_core::domain::CrashBuffer;
use flashread_core::ports::LocalStore;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// A crash buffer older than this is stale and only discarded.
const CRASH_BUFFER_MAX_AGE_SECS: i64 = 3_600;

//=========================================================================================
// Crash buffer file
//=========================================================================================

/// The on-disk slot holding the last flushed position.
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Overwrites the slot. Synchronous by design: the write must complete
    /// before the flush returns.
    pub fn write(&self, buffer: &CrashBuffer) -> std::io::Result<()> {
        let json = serde_json::to_string(buffer)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, json)
    }

    /// Reads the slot; an absent or unparsable file is treated as empty.
    pub fn load(&self) -> Option<CrashBuffer> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

//=========================================================================================
// Debounced progress saver
//=========================================================================================

struct PendingSave {
    document_id: Uuid,
    index: u32,
    total: u32,
}

struct SaverState {
    pending: Option<PendingSave>,
    last_flush: Instant,
}

/// Coalesces bookmark updates into one store write per settle window, with
/// an unconditional `flush` for session boundaries.
pub struct ProgressSaver {
    store: Arc<dyn LocalStore>,
    checkpoint: CheckpointFile,
    window: Duration,
    state: Mutex<SaverState>,
}

impl ProgressSaver {
    pub fn new(store: Arc<dyn LocalStore>, checkpoint: CheckpointFile, window: Duration) -> Self {
        Self {
            store,
            checkpoint,
            window,
            state: Mutex::new(SaverState {
                pending: None,
                last_flush: Instant::now(),
            }),
        }
    }

    /// Notes a new position. The save is deferred until the settle window
    /// has elapsed since the last flush.
    pub async fn note_progress(&self, document_id: Uuid, index: u32, total: u32) {
        let mut state = self.state.lock().await;
        state.pending = Some(PendingSave {
            document_id,
            index,
            total,
        });
        if state.last_flush.elapsed() >= self.window {
            self.flush_locked(&mut state).await;
        }
    }

    /// Writes the pending position through immediately.
    pub async fn flush(&self) {
        let mut state = self.state.lock().await;
        self.flush_locked(&mut state).await;
    }

    /// Bypasses the debounce entirely: persists the given position and the
    /// crash buffer right now. Used by the application-hide path.
    pub async fn save_now(&self, document_id: Uuid, index: u32, total: u32) {
        let mut state = self.state.lock().await;
        state.pending = Some(PendingSave {
            document_id,
            index,
            total,
        });
        self.flush_locked(&mut state).await;
    }

    async fn flush_locked(&self, state: &mut SaverState) {
        let Some(save) = state.pending.take() else {
            return;
        };
        let now = Utc::now();
        if let Err(e) = self
            .store
            .update_progress(save.document_id, save.index, now)
            .await
        {
            warn!("Failed to persist reading progress: {e}");
        }
        let buffer = CrashBuffer {
            document_id: save.document_id,
            index: save.index,
            total: save.total,
            timestamp: now,
        };
        if let Err(e) = self.checkpoint.write(&buffer) {
            warn!("Failed to write crash buffer: {e}");
        }
        state.last_flush = Instant::now();
    }
}

/// Replays the crash buffer into the store on startup: a fresh buffer whose
/// position is ahead of the stored bookmark wins; anything else is ignored.
/// The slot is cleared in every case.
pub async fn replay_crash_buffer(store: &Arc<dyn LocalStore>, checkpoint: &CheckpointFile) {
    let Some(buffer) = checkpoint.load() else {
        return;
    };
    checkpoint.clear();

    let age = Utc::now() - buffer.timestamp;
    if age.num_seconds() > CRASH_BUFFER_MAX_AGE_SECS {
        info!("Discarding stale crash buffer ({}s old)", age.num_seconds());
        return;
    }

    match store.get_document(buffer.document_id).await {
        Ok(Some(doc)) if buffer.index > doc.bookmark_index => {
            info!(
                "Recovering interrupted session: {} -> word {}",
                buffer.document_id, buffer.index
            );
            if let Err(e) = store
                .update_progress(buffer.document_id, buffer.index, buffer.timestamp)
                .await
            {
                warn!("Crash recovery failed: {e}");
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Crash recovery lookup failed: {e}"),
    }
}
