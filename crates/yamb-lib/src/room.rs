use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    dice::{Dice, DiceCount},
    player::{Player, Team},
    scorecard::ScoreCardResult,
    PlayerId, RoomId, MAX_PLAYERS, MIN_PLAYERS,
};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct RoomOptions {
    pub player_count: u8,
    pub dice_count: DiceCount,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            player_count: MIN_PLAYERS,
            dice_count: DiceCount::Five,
        }
    }
}

impl RoomOptions {
    pub fn validate(&self) -> Result<(), InvalidOptions> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.player_count) {
            return Err(InvalidOptions(self.player_count));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("A room is for {MIN_PLAYERS} to {MAX_PLAYERS} players, not {0}")]
pub struct InvalidOptions(pub u8);

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("Attempted to add a player to a full room")]
pub struct RoomFull;

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GamePhase {
    WaitingForPlayers,
    InProgress,
    Finished,
}

/// One game: a fixed number of players taking turns with a single set of dice.
///
/// The room doesn't know who is asking for a change. Checking that the acting player
/// is the one whose turn it is belongs to whoever calls these methods.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Room {
    pub room_id: RoomId,
    pub options: RoomOptions,
    pub players: Vec<Player>,
    pub dice: Dice,
    /// Index into `players` of the player whose turn it is.
    pub current_turn: usize,
    /// Set once the room fills up.
    pub started: bool,
}

impl Room {
    pub fn new(room_id: impl Into<RoomId>, options: RoomOptions) -> Self {
        Self {
            room_id: room_id.into(),
            options,
            players: Vec::new(),
            dice: Dice::new(options.dice_count),
            current_turn: 0,
            started: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= usize::from(self.options.player_count)
    }

    /// Adds `player` to the end of the roster with the next team. The game starts
    /// once the last seat is taken.
    ///
    /// # Errors
    ///
    /// This function will return an error if the room is already full
    pub fn add_player(&mut self, mut player: Player) -> Result<(), RoomFull> {
        if self.is_full() {
            return Err(RoomFull);
        }

        player.team = Team::from_join_order(self.players.len());
        self.players.push(player);
        if self.is_full() {
            self.started = true;
        }
        Ok(())
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_turn)
    }

    pub fn roll(&mut self) -> bool {
        self.dice.roll()
    }

    pub fn toggle_held(&mut self, index: usize) {
        self.dice.toggle(index);
    }

    /// Writes the current player's selected cell using the shared dice.
    /// Returns `None` when the room has no players.
    pub fn fill_current(&mut self) -> Option<ScoreCardResult<u32>> {
        let Room {
            players,
            dice,
            current_turn,
            ..
        } = self;
        let player = players.get_mut(*current_turn)?;
        Some(player.score_card.fill_selected(dice))
    }

    /// Passes the turn to the next player with a fresh set of dice.
    pub fn end_turn(&mut self) {
        if self.players.is_empty() {
            return;
        }
        self.current_turn = (self.current_turn + 1) % self.players.len();
        self.dice = Dice::new(self.options.dice_count);
    }

    /// True once every player has completed their scorecard.
    pub fn game_ended(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.score_card.is_complete())
    }

    /// Orders the roster from highest to lowest total. Players with equal totals keep
    /// their join order.
    pub fn sort_by_score(&mut self) {
        self.players.sort_by_key(|p| Reverse(p.total_score()));
    }

    pub fn phase(&self) -> GamePhase {
        if !self.started {
            GamePhase::WaitingForPlayers
        } else if self.game_ended() {
            GamePhase::Finished
        } else {
            GamePhase::InProgress
        }
    }
}
