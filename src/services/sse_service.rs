use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    state::SharedState,
};

/// Identifies the target SSE stream and which events it forwards.
#[derive(Clone, Debug)]
pub enum StreamKind {
    /// Every event.
    Public,
    /// Only events whose audience names this player.
    Player(String),
}

impl StreamKind {
    fn accepts(&self, event: &ServerEvent) -> bool {
        match self {
            StreamKind::Public => true,
            StreamKind::Player(name) => event.concerns(name),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            StreamKind::Public => "public",
            StreamKind::Player(_) => "player",
        }
    }
}

/// Subscribe to the shared event hub.
pub fn subscribe(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    state: &SharedState,
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let handshake = handshake_event(state, &kind);

    tokio::spawn(async move {
        if let Some(event) = handshake {
            if tx.send(Ok(event)).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if !kind.accepts(&payload) {
                                continue;
                            }
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(stream = kind.label(), skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("Public SSE stream disconnected"),
            StreamKind::Player(name) => info!(player = %name, "Player SSE stream disconnected"),
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn handshake_event(state: &SharedState, kind: &StreamKind) -> Option<Event> {
    let handshake = Handshake {
        stream: kind.label().to_string(),
        message: match kind {
            StreamKind::Public => "public stream connected".to_string(),
            StreamKind::Player(name) => format!("stream connected for player `{name}`"),
        },
        degraded: state.is_degraded(),
    };
    Event::default()
        .event("handshake")
        .json_data(&handshake)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_streams_filter_on_audience() {
        let event = ServerEvent::json(Some("match.updated".to_string()), &1)
            .unwrap()
            .with_audience(&["A".to_owned()]);

        assert!(StreamKind::Public.accepts(&event));
        assert!(StreamKind::Player("A".into()).accepts(&event));
        assert!(!StreamKind::Player("B".into()).accepts(&event));
    }

    #[test]
    fn status_changes_reach_player_streams() {
        let hub = crate::state::SseHub::new(4);
        let mut receiver = hub.subscribe();
        crate::services::sse_events::broadcast_system_status(&hub, true);

        let event = receiver.try_recv().unwrap();
        assert!(event.audience.is_empty());
        assert!(StreamKind::Player("A".into()).accepts(&event));
        assert!(StreamKind::Public.accepts(&event));
    }
}
