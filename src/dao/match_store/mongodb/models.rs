use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{CellEntity, MatchEntity, MarkEntity, PlayerEntity};

/// Match document stored in the `matches` collection, keyed by the hyphenated uuid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    player1: Option<PlayerEntity>,
    player2: Option<PlayerEntity>,
    player_turn: Option<String>,
    winner: Option<String>,
    is_empty: bool,
    created_at: DateTime,
    cells: Vec<MongoCellDocument>,
}

/// Embedded cell; the owning match is implied by the parent document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoCellDocument {
    position: u8,
    mark: MarkEntity,
}

/// Player document stored in the `players` collection, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    name: String,
    mark: MarkEntity,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id.to_string(),
            player1: value.player1,
            player2: value.player2,
            player_turn: value.player_turn,
            winner: value.winner,
            is_empty: value.is_empty,
            created_at: DateTime::from_system_time(value.created_at),
            cells: value
                .cells
                .into_iter()
                .map(|cell| MongoCellDocument {
                    position: cell.position,
                    mark: cell.mark,
                })
                .collect(),
        }
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = uuid::Error;

    fn try_from(value: MongoMatchDocument) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id)?;
        Ok(Self {
            id,
            player1: value.player1,
            player2: value.player2,
            player_turn: value.player_turn,
            winner: value.winner,
            is_empty: value.is_empty,
            created_at: value.created_at.to_system_time(),
            cells: value
                .cells
                .into_iter()
                .map(|cell| CellEntity {
                    position: cell.position,
                    mark: cell.mark,
                    match_id: id,
                })
                .collect(),
        })
    }
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            mark: value.mark,
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            name: value.name,
            mark: value.mark,
        }
    }
}

pub fn doc_id(id: impl Into<String>) -> Document {
    doc! {"_id": id.into()}
}
