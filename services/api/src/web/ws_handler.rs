//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket reading
//! session. It owns the transport commands, delegates pacing to the
//! playback task, and guarantees the cancel-before-reschedule discipline:
//! every command cancels the session's token (stopping the pending
//! word-advance) before mutating the engine, and spawns a fresh playback
//! task only when the engine says playback should continue.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    reading_task::playback_process,
    state::{AppState, ReadingSession},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use flashread_core::reader::{ReaderState, SpeedReader};
use futures::{stream::StreamExt, SinkExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // Engine notifications flow through this channel; a forwarding task
    // serializes them onto the socket in emission order.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let forward_task: JoinHandle<()> = {
        let ws_sender = ws_sender.clone();
        tokio::spawn(async move {
            while let Some(msg) = event_rx.recv().await {
                let Ok(json) = serde_json::to_string(&msg) else {
                    continue;
                };
                if ws_sender.lock().await.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        })
    };

    // --- 1. Initialization Phase ---
    let session_lock: Arc<Mutex<ReadingSession>>;
    if let Some(Ok(Message::Text(init_json))) = receiver.next().await {
        match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init { document_id }) => {
                info!("Initializing reading session for document {document_id}");
                match ReadingSession::new(&app_state, document_id, event_tx.clone()).await {
                    Ok(session) => {
                        let start_index = session.engine.current_index();
                        let total_words = session.engine.total_words();
                        session_lock = Arc::new(Mutex::new(session));

                        let init_msg = ServerMessage::SessionInitialized {
                            document_id,
                            start_index,
                            total_words,
                        };
                        let Ok(init_json) = serde_json::to_string(&init_msg) else {
                            forward_task.abort();
                            return;
                        };
                        if ws_sender
                            .lock()
                            .await
                            .send(Message::Text(init_json.into()))
                            .await
                            .is_err()
                        {
                            error!("Failed to send session initialized message.");
                            forward_task.abort();
                            return;
                        }

                        // The measured session spans this connection.
                        app_state.stats.lock().await.start_session(start_index);
                    }
                    Err(e) => {
                        error!("Failed to initialize reading session: {e}");
                        let err_msg = ServerMessage::Error {
                            message: e.to_string(),
                        };
                        if let Ok(err_json) = serde_json::to_string(&err_msg) {
                            let _ = ws_sender
                                .lock()
                                .await
                                .send(Message::Text(err_json.into()))
                                .await;
                        }
                        forward_task.abort();
                        return;
                    }
                }
            }
            _ => {
                error!("First message was not a valid Init message.");
                forward_task.abort();
                return;
            }
        }
    } else {
        info!("Client disconnected before sending Init message.");
        forward_task.abort();
        return;
    }

    // --- 2. Main Message Loop ---
    let mut playback_handle: Option<JoinHandle<()>> = None;

    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_message(
                        text.to_string(),
                        &app_state,
                        &session_lock,
                        &mut playback_handle,
                    )
                    .await;
                }
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- 3. Cleanup ---
    // Cancel playback, flush the bookmark, and close out the measured
    // session with the engine's final position.
    let (end_index, wpm, completed) = {
        let mut session = session_lock.lock().await;
        session.cancellation_token.cancel();
        let end_index = session.engine.current_index();
        let wpm = session.engine.wpm();
        let completed = session.engine.state() == ReaderState::Completed;
        session.engine.destroy();
        (end_index, wpm, completed)
    };
    app_state.saver.flush().await;
    app_state
        .stats
        .lock()
        .await
        .end_session(end_index, wpm, completed)
        .await;

    if let Some(handle) = playback_handle {
        handle.abort();
    }
    forward_task.abort();
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage`
/// variants.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_lock: &Arc<Mutex<ReadingSession>>,
    playback_handle: &mut Option<JoinHandle<()>>,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(client_msg) => match client_msg {
            ClientMessage::Play => {
                // Playing already: leave the running timer untouched.
                if session_lock.lock().await.engine.state() == ReaderState::Playing {
                    return;
                }
                apply_transport(app_state, session_lock, playback_handle, |engine| {
                    engine.play()
                })
                .await;
            }
            ClientMessage::Pause => {
                apply_transport(app_state, session_lock, playback_handle, |engine| {
                    engine.pause();
                    None
                })
                .await;
                app_state.saver.flush().await;
            }
            ClientMessage::Reset => {
                apply_transport(app_state, session_lock, playback_handle, |engine| {
                    engine.reset();
                    None
                })
                .await;
            }
            ClientMessage::Jump { index } => {
                apply_transport(app_state, session_lock, playback_handle, move |engine| {
                    engine.jump_to_word(index)
                })
                .await;
            }
            ClientMessage::Skip { delta } => {
                apply_transport(app_state, session_lock, playback_handle, move |engine| {
                    engine.skip(delta)
                })
                .await;
            }
            ClientMessage::SetSpeed { wpm } => {
                session_lock.lock().await.engine.set_speed(wpm);
            }
            ClientMessage::SetPunctuationPause { ms } => {
                session_lock.lock().await.engine.set_punctuation_pause(ms);
            }
            ClientMessage::Init { .. } => {
                warn!("Received subsequent Init message, which is ignored.");
            }
        },
        Err(e) => {
            warn!("Failed to deserialize client message: {e}");
        }
    }
}

/// Runs one transport operation under the cancel-before-reschedule
/// discipline: the pending word-advance is cancelled, the engine is
/// mutated, the resulting position is noted for persistence, and a new
/// playback task is spawned only when the operation says playback
/// continues.
async fn apply_transport<F>(
    app_state: &Arc<AppState>,
    session_lock: &Arc<Mutex<ReadingSession>>,
    playback_handle: &mut Option<JoinHandle<()>>,
    op: F,
) where
    F: FnOnce(&mut SpeedReader) -> Option<Duration>,
{
    let (delay, token, document_id, index, total) = {
        let mut session = session_lock.lock().await;
        session.cancellation_token.cancel();
        session.cancellation_token = CancellationToken::new();
        let delay = op(&mut session.engine);
        (
            delay,
            session.cancellation_token.clone(),
            session.document_id,
            session.engine.current_index(),
            session.engine.total_words(),
        )
    };

    app_state
        .saver
        .note_progress(document_id, index as u32, total as u32)
        .await;

    if let Some(delay) = delay {
        *playback_handle = Some(tokio::spawn(playback_process(
            session_lock.clone(),
            app_state.saver.clone(),
            delay,
            token,
        )));
    }
}
