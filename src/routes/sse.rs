use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use validator::Validate;

use crate::{
    dto::game::PlayerIdentity,
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Every match event", content_type = "text/event-stream", body = String))
)]
/// Stream every match event to connected frontends.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state);
    info!("New public SSE connection");
    sse_service::to_sse_stream(&state, receiver, StreamKind::Public)
}

#[utoipa::path(
    get,
    path = "/sse/players/{name}",
    tag = "sse",
    params(("name" = String, Path, description = "Player whose events are streamed")),
    responses(
        (status = 200, description = "Events concerning one player", content_type = "text/event-stream", body = String),
        (status = 400, description = "Invalid player name")
    )
)]
/// Stream the events of the matches a single player takes part in.
pub async fn player_stream(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let identity = PlayerIdentity::new(&name);
    identity.validate()?;

    let receiver = sse_service::subscribe(&state);
    info!(player = identity.name(), "New player SSE connection");
    Ok(sse_service::to_sse_stream(
        &state,
        receiver,
        StreamKind::Player(identity.0),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/players/{name}", get(player_stream))
}
