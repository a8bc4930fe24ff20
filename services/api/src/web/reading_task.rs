//! services/api/src/web/reading_task.rs
//!
//! This module contains the asynchronous "worker" task that paces the
//! presentation engine. It owns the single outstanding word-advance timer
//! for its session: every transport command cancels this task through its
//! `CancellationToken` before touching the engine, so no stale advance can
//! fire after a pause or seek.

use crate::checkpoint::ProgressSaver;
use crate::web::state::ReadingSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Drives the engine until it completes, the playback is cancelled, or the
/// engine stops scheduling. `first_delay` is the delay returned by the
/// `play`/seek call that started this task.
pub async fn playback_process(
    session_lock: Arc<Mutex<ReadingSession>>,
    saver: Arc<ProgressSaver>,
    first_delay: Duration,
    cancellation_token: CancellationToken,
) {
    info!("Playback task started.");
    let mut delay = first_delay;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Playback task cancelled.");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let (next, document_id, index, total) = {
            let mut session = session_lock.lock().await;
            // A command may have raced the timer; the token check under the
            // session lock makes the cancellation decisive.
            if cancellation_token.is_cancelled() {
                return;
            }
            let next = session.engine.step();
            (
                next,
                session.document_id,
                session.engine.current_index(),
                session.engine.total_words(),
            )
        };

        saver
            .note_progress(document_id, index as u32, total as u32)
            .await;

        match next {
            Some(d) => delay = d,
            None => break,
        }
    }

    // Completion (or a mid-step pause): bound data loss right away.
    saver.flush().await;
    info!("Playback task finished.");
}
