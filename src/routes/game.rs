use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::game::{LeaveResponse, MakeMoveRequest, MatchSummary, PlayerIdentity, WinnerResponse},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Header carrying the caller's player name.
pub const PLAYER_HEADER: &str = "x-player-name";

impl<S> FromRequestParts<S> for PlayerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PLAYER_HEADER)
            .ok_or_else(|| AppError::BadRequest("missing X-Player-Name header".into()))?;
        let raw = std::str::from_utf8(raw.as_bytes())
            .map_err(|_| AppError::BadRequest("X-Player-Name must be valid UTF-8".into()))?;

        let identity = PlayerIdentity::new(raw);
        identity.validate()?;
        Ok(identity)
    }
}

/// Routes handling the match lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/{id}", get(get_match))
        .route("/matches/{id}/join", post(join_match))
        .route("/matches/{id}/leave", post(leave_match))
        .route("/matches/{id}/moves", post(make_move))
        .route("/matches/{id}/winner", get(get_winner))
}

/// List every live match, oldest first.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    responses(
        (status = 200, description = "Live matches", body = [MatchSummary])
    )
)]
pub async fn list_matches(State(state): State<SharedState>) -> Json<Vec<MatchSummary>> {
    Json(game_service::list_matches(&state).await)
}

/// Open a new match seated with the caller.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    params(("X-Player-Name" = String, Header, description = "Calling player")),
    responses(
        (status = 201, description = "Match created", body = MatchSummary),
        (status = 400, description = "Invalid player name"),
        (status = 409, description = "Player already in a match")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    player: PlayerIdentity,
) -> Result<(StatusCode, Json<MatchSummary>), AppError> {
    let summary = game_service::create_match(&state, player.name()).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Fetch a single match.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match found", body = MatchSummary),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(game_service::get_match(&state, id).await?))
}

/// Take the free slot of a match.
#[utoipa::path(
    post,
    path = "/matches/{id}/join",
    tag = "matches",
    params(
        ("id" = Uuid, Path, description = "Identifier of the match"),
        ("X-Player-Name" = String, Header, description = "Calling player")
    ),
    responses(
        (status = 200, description = "Player seated", body = MatchSummary),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Match full or player already in a match")
    )
)]
pub async fn join_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    player: PlayerIdentity,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(
        game_service::join_match(&state, id, player.name()).await?,
    ))
}

/// Leave a match; the match is deleted once nobody is left.
#[utoipa::path(
    post,
    path = "/matches/{id}/leave",
    tag = "matches",
    params(
        ("id" = Uuid, Path, description = "Identifier of the match"),
        ("X-Player-Name" = String, Header, description = "Calling player")
    ),
    responses(
        (status = 200, description = "Player removed", body = LeaveResponse),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Player not seated in this match")
    )
)]
pub async fn leave_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    player: PlayerIdentity,
) -> Result<Json<LeaveResponse>, AppError> {
    Ok(Json(
        game_service::leave_match(&state, id, player.name()).await?,
    ))
}

/// Play a cell.
#[utoipa::path(
    post,
    path = "/matches/{id}/moves",
    tag = "matches",
    request_body = MakeMoveRequest,
    params(
        ("id" = Uuid, Path, description = "Identifier of the match"),
        ("X-Player-Name" = String, Header, description = "Calling player")
    ),
    responses(
        (status = 200, description = "Move played", body = MatchSummary),
        (status = 403, description = "Caller does not play in this match"),
        (status = 404, description = "Unknown match or cell"),
        (status = 409, description = "Not the caller's turn or cell already played")
    )
)]
pub async fn make_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    player: PlayerIdentity,
    Json(payload): Json<MakeMoveRequest>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(
        game_service::make_move(&state, id, player.name(), payload.position).await?,
    ))
}

/// Winner of a match, `null` while undecided.
#[utoipa::path(
    get,
    path = "/matches/{id}/winner",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Winner lookup", body = WinnerResponse),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_winner(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WinnerResponse>, AppError> {
    Ok(Json(game_service::winner(&state, id).await?))
}
