// WebSocket event types for the codepair realtime channel.
//
// Frames are internally tagged JSON; field names are camelCase to match
// the browser client's payloads.

use crate::language::Language;
use crate::types::ParticipantInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client -> Server events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Enter a session room and receive the current buffer state.
    Join {
        session_id: Uuid,
        participant_id: String,
        display_name: String,
    },

    /// Replace the shared buffer with a new full value.
    CodeChange {
        session_id: Uuid,
        code: String,
        participant_id: String,
    },

    /// Switch the session language, resetting the buffer for everyone.
    LanguageChange {
        session_id: Uuid,
        language: Language,
        participant_id: String,
    },
}

/// Server -> Client events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full-state snapshot sent to the joining connection only.
    Joined {
        session_id: Uuid,
        code: String,
        language: Language,
        participants: Vec<ParticipantInfo>,
        count: usize,
    },

    /// A participant entered the room (not sent to the one who joined).
    PresenceJoined {
        participant_id: String,
        display_name: String,
        count: usize,
    },

    /// Buffer replaced; sent to every room member except the origin.
    CodeUpdated {
        code: String,
        participant_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Language switched and buffer reset; sent to every room member,
    /// origin included.
    LanguageUpdated {
        language: Language,
        code: String,
        participant_id: String,
    },

    /// A participant left the room.
    PresenceLeft {
        participant_id: String,
        count: usize,
    },

    /// Failure notification, delivered only to the connection whose
    /// event triggered it.
    ErrorEvent {
        message: String,
        code: String,
    },
}
