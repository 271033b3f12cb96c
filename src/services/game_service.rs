use uuid::Uuid;

use crate::{
    dto::game::{LeaveResponse, MatchSummary, PlayerSummary, WinnerResponse},
    error::ServiceError,
    state::{
        SharedState,
        registry::{LeaveOutcome, MoveOutcome},
    },
};

/// Open a new match seated with `player`.
pub async fn create_match(state: &SharedState, player: &str) -> Result<MatchSummary, ServiceError> {
    let snapshot = state.registry().create(player).await?;
    Ok(snapshot.into())
}

/// Seat `player` in an existing match.
pub async fn join_match(
    state: &SharedState,
    id: Uuid,
    player: &str,
) -> Result<MatchSummary, ServiceError> {
    let snapshot = state.registry().join(id, player).await?;
    Ok(snapshot.into())
}

/// Remove `player` from a match.
pub async fn leave_match(
    state: &SharedState,
    id: Uuid,
    player: &str,
) -> Result<LeaveResponse, ServiceError> {
    let response = match state.registry().leave(id, player).await? {
        LeaveOutcome::Deleted(_) => LeaveResponse {
            deleted: true,
            game: None,
        },
        LeaveOutcome::Updated(snapshot) => LeaveResponse {
            deleted: false,
            game: Some(snapshot.into()),
        },
    };
    Ok(response)
}

/// Play a cell on behalf of `player`.
pub async fn make_move(
    state: &SharedState,
    id: Uuid,
    player: &str,
    position: usize,
) -> Result<MatchSummary, ServiceError> {
    match state.registry().make_move(id, player, position).await? {
        MoveOutcome::Applied(snapshot) => Ok(snapshot.into()),
        MoveOutcome::CellTaken => Err(ServiceError::InvalidState(format!(
            "cell {position} has already been played"
        ))),
    }
}

/// Winner of a match, if any.
pub async fn winner(state: &SharedState, id: Uuid) -> Result<WinnerResponse, ServiceError> {
    let winner = state.registry().winner(id).await?;
    Ok(WinnerResponse {
        winner: winner.map(PlayerSummary::from),
    })
}

/// A single match.
pub async fn get_match(state: &SharedState, id: Uuid) -> Result<MatchSummary, ServiceError> {
    let snapshot = state.registry().get(id).await?;
    Ok(snapshot.into())
}

/// Every live match.
pub async fn list_matches(state: &SharedState) -> Vec<MatchSummary> {
    state
        .registry()
        .list()
        .await
        .into_iter()
        .map(Into::into)
        .collect()
}
