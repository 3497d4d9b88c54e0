use serde::{Deserialize, Serialize};

/// Unit of communication between contexts of one session. Every variant
/// carries the sender's peer id; receivers discard their own echoes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PresenceMessage {
    Announce { peer_id: String },
    Present { peer_id: String },
    Heartbeat { peer_id: String },
    Departing { peer_id: String },
    QueryPeers { peer_id: String },
    SessionTornDown { peer_id: String },
}

impl PresenceMessage {
    pub fn peer_id(&self) -> &str {
        match self {
            PresenceMessage::Announce { peer_id }
            | PresenceMessage::Present { peer_id }
            | PresenceMessage::Heartbeat { peer_id }
            | PresenceMessage::Departing { peer_id }
            | PresenceMessage::QueryPeers { peer_id }
            | PresenceMessage::SessionTornDown { peer_id } => peer_id,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("Could not encode presence message")
    }

    /// Strict decode: anything that is not a known message shape is `None`.
    pub fn decode(raw: &str) -> Option<PresenceMessage> {
        serde_json::from_str(raw).ok()
    }
}
