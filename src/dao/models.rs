use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Mark as stored by persistence backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkEntity {
    Empty,
    X,
    O,
}

/// Player record, looked up by its unique name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Unique player name.
    pub name: String,
    /// Mark held in the player's current match.
    pub mark: MarkEntity,
}

/// One board cell. `match_id` refers back to the owning match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellEntity {
    /// Row-major index (0-8).
    pub position: u8,
    /// Current mark.
    pub mark: MarkEntity,
    /// Identifier of the owning match.
    pub match_id: Uuid,
}

/// Aggregate match entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Player in the first slot.
    pub player1: Option<PlayerEntity>,
    /// Player in the second slot.
    pub player2: Option<PlayerEntity>,
    /// Name of the player expected to move next.
    pub player_turn: Option<String>,
    /// Name of the winner, once decided.
    pub winner: Option<String>,
    /// Whether both slots are free.
    pub is_empty: bool,
    /// Creation timestamp, drives stale-match expiry.
    pub created_at: SystemTime,
    /// The nine board cells.
    pub cells: Vec<CellEntity>,
}
