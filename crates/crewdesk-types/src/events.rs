use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::MessageResponse;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, name: String },

    /// Full message history for the channel just watched, ascending by
    /// creation time. Always delivered before any live MessageCreate for
    /// that channel.
    HistoryBatch {
        channel_id: Uuid,
        messages: Vec<MessageResponse>,
    },

    /// A new message was posted
    MessageCreate {
        id: Uuid,
        channel_id: Uuid,
        author_id: Uuid,
        author_name: String,
        author_avatar_url: Option<String>,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Returns the channel_id if this event is scoped to a specific channel.
    /// Events that return `None` are connection-level and bypass the watch filter.
    pub fn channel_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { channel_id, .. } => Some(*channel_id),
            Self::HistoryBatch { channel_id, .. } => Some(*channel_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Open the live feed for a single channel. Replaces any feed already
    /// open on this connection; the old one is released first.
    Watch { channel_id: Uuid },

    /// Release the current feed, if any. Safe to send twice.
    Unwatch,
}
