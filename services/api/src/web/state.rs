//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::checkpoint::ProgressSaver;
use crate::config::Config;
use crate::web::protocol::{ChannelObserver, ServerMessage};
use flashread_core::parser::parse_text;
use flashread_core::ports::{Clock, LocalStore, PortError, PortResult, RemoteStore, SourceParser};
use flashread_core::reader::{ReaderOptions, SpeedReader};
use flashread_core::stats::StatsEngine;
use flashread_core::sync::SyncCoordinator;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub parser: Arc<dyn SourceParser>,
    pub clock: Arc<dyn Clock>,
    pub sync: Arc<SyncCoordinator>,
    /// One active measured session at a time, spanning whichever WebSocket
    /// connection is currently reading.
    pub stats: Arc<Mutex<StatsEngine>>,
    pub saver: Arc<ProgressSaver>,
    pub config: Arc<Config>,
}

//=========================================================================================
// ReadingSession (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active WebSocket reading session.
pub struct ReadingSession {
    pub document_id: Uuid,
    pub engine: SpeedReader,
    /// A token to gracefully cancel the current playback task.
    pub cancellation_token: CancellationToken,
}

impl ReadingSession {
    /// Creates a new `ReadingSession` by loading the document and seating
    /// the engine at its bookmark. Ghost documents cannot be read until
    /// their content is re-supplied.
    pub async fn new(
        app_state: &Arc<AppState>,
        document_id: Uuid,
        events: UnboundedSender<ServerMessage>,
    ) -> PortResult<Self> {
        let doc = app_state
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("Document {document_id} not found")))?;

        if doc.is_ghost || doc.content.is_empty() {
            return Err(PortError::InvalidInput(
                "This document has no content on this device; re-upload the original file first."
                    .to_string(),
            ));
        }

        let words = parse_text(&doc.content);
        let engine = SpeedReader::with_start_index(
            words,
            ReaderOptions::default(),
            Box::new(ChannelObserver::new(events)),
            doc.bookmark_index as usize,
        );

        Ok(Self {
            document_id,
            engine,
            cancellation_token: CancellationToken::new(),
        })
    }
}
