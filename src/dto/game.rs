use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{format_time, validation::validate_player_name},
    state::{
        board::{Cell, Mark},
        game::{MatchPhase, MatchSnapshot, Player},
    },
};

/// Player as exposed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerSummary {
    pub name: String,
    pub mark: Mark,
}

impl From<Player> for PlayerSummary {
    fn from(player: Player) -> Self {
        Self {
            name: player.name,
            mark: player.mark,
        }
    }
}

/// One board cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CellSummary {
    /// Row-major index (0-8).
    pub position: usize,
    pub mark: Mark,
    pub match_id: Uuid,
}

impl From<Cell> for CellSummary {
    fn from(cell: Cell) -> Self {
        Self {
            position: cell.position,
            mark: cell.mark,
            match_id: cell.match_id,
        }
    }
}

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhaseDto {
    Empty,
    WaitingForOpponent,
    InProgress,
    Won,
    Draw,
}

impl From<MatchPhase> for MatchPhaseDto {
    fn from(phase: MatchPhase) -> Self {
        match phase {
            MatchPhase::Empty => MatchPhaseDto::Empty,
            MatchPhase::WaitingForOpponent => MatchPhaseDto::WaitingForOpponent,
            MatchPhase::InProgress => MatchPhaseDto::InProgress,
            MatchPhase::Won => MatchPhaseDto::Won,
            MatchPhase::Draw => MatchPhaseDto::Draw,
        }
    }
}

/// Full view of a match returned by every match endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MatchSummary {
    pub id: Uuid,
    pub player1: Option<PlayerSummary>,
    pub player2: Option<PlayerSummary>,
    /// Player expected to move next; absent until two players are seated and once decided.
    pub player_turn: Option<PlayerSummary>,
    pub winner: Option<PlayerSummary>,
    pub phase: MatchPhaseDto,
    pub is_empty: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub cells: Vec<CellSummary>,
}

impl From<MatchSnapshot> for MatchSummary {
    fn from(snapshot: MatchSnapshot) -> Self {
        Self {
            id: snapshot.id,
            player1: snapshot.player1.map(Into::into),
            player2: snapshot.player2.map(Into::into),
            player_turn: snapshot.player_turn.map(Into::into),
            winner: snapshot.winner.map(Into::into),
            phase: snapshot.phase.into(),
            is_empty: snapshot.is_empty,
            created_at: format_time(snapshot.created_at),
            cells: snapshot.cells.into_iter().map(Into::into).collect(),
        }
    }
}

/// Body of `POST /matches/{id}/moves`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct MakeMoveRequest {
    /// Row-major cell index (0-8).
    pub position: usize,
}

/// Result of leaving a match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaveResponse {
    /// Whether the match was removed because nobody is left.
    pub deleted: bool,
    /// Remaining match, when it survives.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none", default)]
    pub game: Option<MatchSummary>,
}

/// Winner lookup result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WinnerResponse {
    pub winner: Option<PlayerSummary>,
}

/// Name of the calling player, as sent in the `X-Player-Name` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity(pub String);

impl PlayerIdentity {
    /// Trimmed player name.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    /// Borrow the name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Validate for PlayerIdentity {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_player_name(&self.0) {
            errors.add("player", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
