use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::registry::DeletionReason;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// Players this event concerns. Empty means every player.
    pub audience: Vec<String>,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
            audience: Vec::new(),
        })
    }

    /// Restrict the event to the given players on per-player streams.
    pub fn with_audience(mut self, audience: &[String]) -> Self {
        self.audience = audience.to_vec();
        self
    }

    /// Whether `player` is part of the audience. Events without an audience concern everyone.
    pub fn concerns(&self, player: &str) -> bool {
        self.audience.is_empty() || self.audience.iter().any(|name| name == player)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `player`).
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
/// Why a match was removed.
pub enum DeletionReasonDto {
    Left,
    Expired,
}

impl From<DeletionReason> for DeletionReasonDto {
    fn from(reason: DeletionReason) -> Self {
        match reason {
            DeletionReason::Left => DeletionReasonDto::Left,
            DeletionReason::Expired => DeletionReasonDto::Expired,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Event emitted when a match has been removed.
pub struct MatchDeletedEvent {
    pub match_id: Uuid,
    pub reason: DeletionReasonDto,
}
