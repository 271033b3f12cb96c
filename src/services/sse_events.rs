use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        game::MatchSummary,
        sse::{MatchDeletedEvent, ServerEvent, SystemStatus},
    },
    state::{
        SseHub,
        game::MatchSnapshot,
        registry::{DeletionReason, MatchNotifier},
    },
};

/// Event name carrying a full match summary.
pub const EVENT_MATCH_UPDATED: &str = "match.updated";
/// Event name announcing a removed match.
pub const EVENT_MATCH_DELETED: &str = "match.deleted";
const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Forwards registry changes to the SSE hub.
pub struct SseNotifier {
    hub: SseHub,
}

impl SseNotifier {
    /// Build a notifier publishing on `hub`.
    pub fn new(hub: SseHub) -> Self {
        Self { hub }
    }
}

impl MatchNotifier for SseNotifier {
    fn match_updated(&self, snapshot: &MatchSnapshot, audience: &[String]) {
        let payload = MatchSummary::from(snapshot.clone());
        send_event(&self.hub, EVENT_MATCH_UPDATED, &payload, audience);
    }

    fn match_deleted(&self, match_id: Uuid, reason: DeletionReason, audience: &[String]) {
        let payload = MatchDeletedEvent {
            match_id,
            reason: reason.into(),
        };
        send_event(&self.hub, EVENT_MATCH_DELETED, &payload, audience);
    }
}

/// Broadcast whether the backend currently runs without storage.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    send_event(hub, EVENT_SYSTEM_STATUS, &SystemStatus { degraded }, &[]);
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize, audience: &[String]) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event.with_audience(audience)),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
