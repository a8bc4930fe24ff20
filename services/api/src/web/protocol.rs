//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and
//! the API server for the RSVP reading session.

use flashread_core::reader::ReaderObserver;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Initializes a session over one document. This must be the first
    /// message sent on the connection.
    Init { document_id: Uuid },

    /// Starts or resumes playback from the current position.
    Play,

    /// Pauses playback, flushing the bookmark.
    Pause,

    /// Rewinds to the beginning of the document.
    Reset,

    /// Seeks to an absolute word index (clamped into range).
    Jump { index: usize },

    /// Seeks relative to the current position.
    Skip { delta: i64 },

    /// Live-updates the reading speed.
    SetSpeed { wpm: u16 },

    /// Live-updates the punctuation pause.
    SetPunctuationPause { ms: u16 },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization.
    SessionInitialized {
        document_id: Uuid,
        start_index: usize,
        total_words: usize,
    },

    /// The word being presented right now.
    Word { word: String, index: usize },

    /// Progress through the document.
    Progress {
        percent: f64,
        current: usize,
        total: usize,
    },

    /// The whole document has been presented.
    Completed,

    /// Reports a fatal error to the client, which should display an error
    /// message.
    Error { message: String },
}

/// Bridges the engine's observer callbacks onto the connection's outbound
/// message channel, preserving synchronous, ordered delivery.
pub struct ChannelObserver {
    sender: UnboundedSender<ServerMessage>,
}

impl ChannelObserver {
    pub fn new(sender: UnboundedSender<ServerMessage>) -> Self {
        Self { sender }
    }
}

impl ReaderObserver for ChannelObserver {
    fn on_word(&mut self, word: &str, index: usize) {
        let _ = self.sender.send(ServerMessage::Word {
            word: word.to_string(),
            index,
        });
    }

    fn on_progress(&mut self, percent: f64, current: usize, total: usize) {
        let _ = self.sender.send(ServerMessage::Progress {
            percent,
            current,
            total,
        });
    }

    fn on_complete(&mut self) {
        let _ = self.sender.send(ServerMessage::Completed);
    }
}
