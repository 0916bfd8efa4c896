//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server.
//! The server pushes progression and sync notifications; the client may toggle items
//! and ping.

use ascendant_core::{Buff, ProgressEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Completes or un-completes a quest or habit.
    Toggle { id: Uuid },

    Ping,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The player reached a new level, possibly unlocking a perk.
    LevelUp { level: u32, perk: Option<Buff> },

    SkillMastered { node_id: String, name: String },

    /// Answer to a `toggle` sent over the socket.
    Toggled { id: Uuid, completed: bool },

    SyncCompleted { at: DateTime<Utc> },

    /// A push or pull failed. The client should show a non-blocking notice.
    SyncFailed { message: String },

    Error { message: String },

    Pong,
}

impl From<ProgressEvent> for ServerMessage {
    fn from(event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::LevelUp { level, perk } => ServerMessage::LevelUp { level, perk },
            ProgressEvent::SkillMastered { node_id, name } => {
                ServerMessage::SkillMastered { node_id, name }
            }
        }
    }
}
