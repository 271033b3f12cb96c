use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, PlayerEntity},
    state::{
        board::{Board, BoardError, Cell, Mark},
        coin::CoinFlip,
    },
};

/// Participant of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Unique name across the system.
    pub name: String,
    /// Mark held in the current match; meaningless outside of one.
    pub mark: Mark,
}

impl Player {
    /// Fresh player record without a mark.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mark: Mark::Empty,
        }
    }
}

/// One of the two player positions of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Populated first.
    First,
    /// Populated once the first slot is taken.
    Second,
}

impl Slot {
    fn other(self) -> Self {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// Lifecycle phase derived from the slots, winner and board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// No player in either slot.
    Empty,
    /// One player waiting for an opponent.
    WaitingForOpponent,
    /// Two players, a turn holder, no winner yet.
    InProgress,
    /// A line has been completed.
    Won,
    /// Board filled without a completed line.
    Draw,
}

/// Errors raised by match transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Both slots are taken.
    #[error("match is already full")]
    AlreadyFull,
    /// The player occupies neither slot.
    #[error("player `{0}` is not in the match")]
    NotInMatch(String),
    /// The player is not the current turn holder.
    #[error("it is not `{0}`'s turn")]
    WrongTurn(String),
    /// Board rejected the move target.
    #[error(transparent)]
    Board(#[from] BoardError),
    /// A persisted record violates match invariants.
    #[error("invalid match record: {0}")]
    InvalidRecord(String),
}

/// A two-player tic-tac-toe match.
#[derive(Debug, Clone)]
pub struct Match {
    id: Uuid,
    player1: Option<Player>,
    player2: Option<Player>,
    turn: Option<Slot>,
    winner: Option<Slot>,
    is_empty: bool,
    created_at: OffsetDateTime,
    board: Board,
}

/// Read-only copy of a match handed to callers and collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    /// Match identifier.
    pub id: Uuid,
    /// First slot occupant.
    pub player1: Option<Player>,
    /// Second slot occupant.
    pub player2: Option<Player>,
    /// Player allowed to move next.
    pub player_turn: Option<Player>,
    /// Winner, once decided.
    pub winner: Option<Player>,
    /// True when nobody occupies the match.
    pub is_empty: bool,
    /// Derived lifecycle phase.
    pub phase: MatchPhase,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// The nine cells in position order.
    pub cells: Vec<Cell>,
}

impl MatchSnapshot {
    /// Names of the players currently seated.
    pub fn participants(&self) -> Vec<String> {
        seated_names(&self.player1, &self.player2)
    }
}

fn seated_names(player1: &Option<Player>, player2: &Option<Player>) -> Vec<String> {
    [player1, player2]
        .into_iter()
        .flatten()
        .map(|player| player.name.clone())
        .collect()
}

impl Match {
    /// Create an empty match with a freshly generated board.
    pub fn new(id: Uuid, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            player1: None,
            player2: None,
            turn: None,
            winner: None,
            is_empty: true,
            created_at,
            board: Board::generate(id),
        }
    }

    /// Seat `player`, assigning its mark and starting the game once both slots are taken.
    pub fn join(&mut self, mut player: Player, coin: &dyn CoinFlip) -> Result<Slot, MatchError> {
        if self.player1.is_some() && self.player2.is_some() {
            return Err(MatchError::AlreadyFull);
        }

        match self.player1.as_ref().map(|first| first.mark) {
            None => {
                player.mark = if coin.flip() { Mark::X } else { Mark::O };
                self.player1 = Some(player);
                self.is_empty = false;
                Ok(Slot::First)
            }
            Some(first_mark) => {
                player.mark = first_mark.opposite();
                self.player2 = Some(player);
                self.turn = Some(if coin.flip() {
                    Slot::First
                } else {
                    Slot::Second
                });
                Ok(Slot::Second)
            }
        }
    }

    /// Remove `name` from the match.
    ///
    /// When the first player leaves, the second one is promoted. Unless the match ends up
    /// empty, the board, turn and winner are reset.
    pub fn leave(&mut self, name: &str) -> Result<(), MatchError> {
        if self.occupies(Slot::First, name) {
            match self.player2.take() {
                Some(second) => self.player1 = Some(second),
                None => {
                    self.player1 = None;
                    self.is_empty = true;
                }
            }
        } else if self.occupies(Slot::Second, name) {
            self.player2 = None;
        } else {
            return Err(MatchError::NotInMatch(name.to_owned()));
        }

        self.reset();
        Ok(())
    }

    /// Play `position` on behalf of `name`.
    ///
    /// Returns `Ok(false)` without any state change when the cell is already taken.
    pub fn make_move(&mut self, name: &str, position: usize) -> Result<bool, MatchError> {
        let Some((slot, mark)) = self
            .turn
            .and_then(|slot| self.player(slot).map(|player| (slot, player)))
            .filter(|(_, player)| player.name == name)
            .map(|(slot, player)| (slot, player.mark))
        else {
            return Err(MatchError::WrongTurn(name.to_owned()));
        };

        if !self.board.apply_move(position, mark)? {
            return Ok(false);
        }

        self.turn = Some(slot.other());
        self.check_outcome();
        Ok(true)
    }

    /// Identifier of the match.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation time.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// True when nobody occupies the match.
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    /// Winner, once decided.
    pub fn winner(&self) -> Option<&Player> {
        self.winner.and_then(|slot| self.player(slot))
    }

    /// Player allowed to move next.
    pub fn turn_holder(&self) -> Option<&Player> {
        self.turn.and_then(|slot| self.player(slot))
    }

    /// Whether `name` occupies either slot.
    pub fn is_participant(&self, name: &str) -> bool {
        self.occupies(Slot::First, name) || self.occupies(Slot::Second, name)
    }

    /// Names of the players currently seated.
    pub fn participants(&self) -> Vec<String> {
        seated_names(&self.player1, &self.player2)
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> MatchPhase {
        if self.player1.is_none() {
            MatchPhase::Empty
        } else if self.player2.is_none() {
            MatchPhase::WaitingForOpponent
        } else if self.winner.is_some() {
            MatchPhase::Won
        } else if self.board.is_full() {
            MatchPhase::Draw
        } else {
            MatchPhase::InProgress
        }
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            player_turn: self.turn_holder().cloned(),
            winner: self.winner().cloned(),
            is_empty: self.is_empty,
            phase: self.phase(),
            created_at: self.created_at,
            cells: self.board.cells().to_vec(),
        }
    }

    fn player(&self, slot: Slot) -> Option<&Player> {
        match slot {
            Slot::First => self.player1.as_ref(),
            Slot::Second => self.player2.as_ref(),
        }
    }

    fn occupies(&self, slot: Slot, name: &str) -> bool {
        self.player(slot).is_some_and(|player| player.name == name)
    }

    fn slot_of_mark(&self, mark: Mark) -> Option<Slot> {
        [Slot::First, Slot::Second]
            .into_iter()
            .find(|slot| self.player(*slot).is_some_and(|player| player.mark == mark))
    }

    // First completed line wins; the game is over once decided or drawn.
    fn check_outcome(&mut self) {
        if let Some(mark) = self.board.winning_mark() {
            self.winner = self.slot_of_mark(mark);
            self.turn = None;
        } else if self.board.is_full() {
            self.turn = None;
        }
    }

    fn reset(&mut self) {
        self.board.clear();
        self.turn = None;
        self.winner = None;
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            mark: value.mark.into(),
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            name: value.name,
            mark: value.mark.into(),
        }
    }
}

impl From<MatchSnapshot> for MatchEntity {
    fn from(value: MatchSnapshot) -> Self {
        Self {
            id: value.id,
            player1: value.player1.map(Into::into),
            player2: value.player2.map(Into::into),
            player_turn: value.player_turn.map(|player| player.name),
            winner: value.winner.map(|player| player.name),
            is_empty: value.is_empty,
            created_at: value.created_at.into(),
            cells: value.cells.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<MatchEntity> for Match {
    type Error = MatchError;

    fn try_from(value: MatchEntity) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| MatchError::InvalidRecord(format!("{}: {reason}", value.id));

        let board = Board::from_cells(value.id, &value.cells)
            .ok_or_else(|| invalid("board must hold nine distinct cells of this match"))?;
        let player1: Option<Player> = value.player1.clone().map(Into::into);
        let player2: Option<Player> = value.player2.clone().map(Into::into);

        match (&player1, &player2) {
            (None, Some(_)) => return Err(invalid("second slot taken while first is free")),
            (Some(first), Some(second)) => {
                if first.name == second.name {
                    return Err(invalid("same player in both slots"));
                }
                if first.mark == Mark::Empty || first.mark != second.mark.opposite() {
                    return Err(invalid("players must hold opposite marks"));
                }
            }
            (Some(first), None) if first.mark == Mark::Empty => {
                return Err(invalid("seated player has no mark"));
            }
            _ => {}
        }

        let mut game = Match {
            id: value.id,
            is_empty: player1.is_none(),
            player1,
            player2,
            turn: None,
            winner: None,
            created_at: value.created_at.into(),
            board,
        };

        let slot_of = |game: &Match, name: &str| {
            [Slot::First, Slot::Second]
                .into_iter()
                .find(|slot| game.occupies(*slot, name))
        };

        let line = game.board.winning_mark();
        match value.winner.as_deref() {
            Some(name) => {
                let slot = slot_of(&game, name).ok_or_else(|| invalid("winner is not seated"))?;
                if game.player(slot).map(|player| player.mark) != line {
                    return Err(invalid("winner did not complete a line"));
                }
                game.winner = Some(slot);
            }
            None if line.is_some() => return Err(invalid("completed line without a winner")),
            None => {}
        }

        if let Some(name) = value.player_turn.as_deref() {
            if game.winner.is_some() {
                return Err(invalid("turn set on a decided match"));
            }
            if game.player2.is_none() {
                return Err(invalid("turn set before both slots are filled"));
            }
            game.turn =
                Some(slot_of(&game, name).ok_or_else(|| invalid("turn holder is not seated"))?);
        }

        Ok(game)
    }
}
