// Core domain types shared across the Codepair crates.

use serde::{Deserialize, Serialize};

/// Outward-facing view of a session participant.
///
/// Deliberately excludes the transport connection id — connection
/// identifiers never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    /// Client-supplied stable identifier (survives reconnects).
    pub id: String,
    pub display_name: String,
}
