// JSON messages exchanged with roster service clients.
//
// Requests and responses are tagged with a SCREAMING_SNAKE_CASE `type` field.

use fantaroster_core::roster::RosterFilter;
use fantaroster_core::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientRequest {
    ListPlayers {
        #[serde(default)]
        filter: RosterFilter,
    },
    AddPlayer {
        player: IndexMap<String, serde_json::Value>,
    },
    DeletePlayer {
        id: u64,
    },
    DeletePlayerByName {
        name: String,
        #[serde(default)]
        team: Option<String>,
    },
}

/// Flatten a JSON player object into a roster record. Numbers and booleans
/// keep their JSON text, `null` becomes an empty field, and nested values
/// are kept as compact JSON.
pub fn player_record(player: &IndexMap<String, serde_json::Value>) -> Record {
    player
        .iter()
        .map(|(field, value)| {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (field.clone(), text)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerResponse {
    Players { players: Vec<Record>, total: usize },
    PlayerAdded { id: u64 },
    PlayerDeleted { removed: usize },
    Error { message: String },
}

impl ServerResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"ERROR","message":"failed to encode response: {e}"}}"#)
        })
    }
}
