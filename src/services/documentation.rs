use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for TicTacToe Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::player_stream,
        crate::routes::game::list_matches,
        crate::routes::game::create_match,
        crate::routes::game::get_match,
        crate::routes::game::join_match,
        crate::routes::game::leave_match,
        crate::routes::game::make_move,
        crate::routes::game::get_winner,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::MatchSummary,
            crate::dto::game::PlayerSummary,
            crate::dto::game::CellSummary,
            crate::dto::game::MatchPhaseDto,
            crate::dto::game::MakeMoveRequest,
            crate::dto::game::LeaveResponse,
            crate::dto::game::WinnerResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MatchDeletedEvent,
            crate::dto::sse::DeletionReasonDto,
            crate::state::board::Mark,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "matches", description = "Tic-tac-toe match operations"),
    )
)]
pub struct ApiDoc;
