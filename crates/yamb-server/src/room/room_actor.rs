use tokio::sync::{mpsc, oneshot};
use tracing::instrument;
use yamb_lib::event::Event;
use yamb_lib::player::Player;
use yamb_lib::room::{GamePhase, Room, RoomOptions};
use yamb_lib::scorecard::{Column, Row};
use yamb_lib::{PlayerId, RoomId};

use crate::state::OwnedId;

use super::broadcaster::{Broadcaster, Subscription};
use super::{RoomError, RoomResult};

/// Owns a [`Room`] and applies every change to it, one message at a time.
pub struct RoomActor {
    receiver: mpsc::Receiver<RoomAction>,
    room: Room,
    broadcaster: Broadcaster,
    // Removes the room from the server when the actor goes away
    _id: OwnedId<RoomId>,
}

#[derive(Debug)]
pub enum RoomAction {
    Join {
        respond_to: oneshot::Sender<RoomResult<Subscription>>,
        id: PlayerId,
        name: String,
    },
    Resume {
        respond_to: oneshot::Sender<RoomResult<Subscription>>,
        id: PlayerId,
    },
    RollDice {
        respond_to: oneshot::Sender<RoomResult<()>>,
        id: PlayerId,
    },
    ToggleDie {
        respond_to: oneshot::Sender<RoomResult<()>>,
        id: PlayerId,
        index: usize,
    },
    SelectCell {
        respond_to: oneshot::Sender<RoomResult<()>>,
        id: PlayerId,
        row: Row,
        column: Column,
    },
    Announce {
        respond_to: oneshot::Sender<RoomResult<()>>,
        id: PlayerId,
    },
    WriteScore {
        respond_to: oneshot::Sender<RoomResult<u32>>,
        id: PlayerId,
    },
    Snapshot {
        respond_to: oneshot::Sender<Room>,
    },
}

impl RoomActor {
    pub fn new(
        receiver: mpsc::Receiver<RoomAction>,
        id: OwnedId<RoomId>,
        options: RoomOptions,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            receiver,
            room: Room::new(*id, options),
            broadcaster,
            _id: id,
        }
    }

    #[instrument(skip_all, fields(room_id = %self.room.room_id))]
    pub async fn run(mut self) {
        tracing::info!("Room opened");
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                RoomAction::Join {
                    respond_to,
                    id,
                    name,
                } => {
                    let _ = respond_to.send(self.join_room(id, name));
                }
                RoomAction::Resume { respond_to, id } => {
                    let _ = respond_to.send(self.resume_room(id));
                }
                RoomAction::RollDice { respond_to, id } => {
                    let _ = respond_to.send(self.roll_dice(id));
                }
                RoomAction::ToggleDie {
                    respond_to,
                    id,
                    index,
                } => {
                    let _ = respond_to.send(self.toggle_die(id, index));
                }
                RoomAction::SelectCell {
                    respond_to,
                    id,
                    row,
                    column,
                } => {
                    let _ = respond_to.send(self.select_cell(id, row, column));
                }
                RoomAction::Announce { respond_to, id } => {
                    let _ = respond_to.send(self.announce(id));
                }
                RoomAction::WriteScore { respond_to, id } => {
                    let _ = respond_to.send(self.write_score(id));
                }
                RoomAction::Snapshot { respond_to } => {
                    let _ = respond_to.send(self.room.clone());
                }
            }
        }
    }

    /// Only the player whose turn it is may act, and only while the game is running.
    fn check_turn(&self, player_id: PlayerId) -> RoomResult<()> {
        if self.room.player(player_id).is_none() {
            return Err(RoomError::PlayerInvalid(player_id));
        }
        match self.room.phase() {
            GamePhase::WaitingForPlayers => return Err(RoomError::GameNotStarted),
            GamePhase::Finished => return Err(RoomError::GameOver),
            GamePhase::InProgress => (),
        }
        if self.room.current_player().map(|p| p.id) != Some(player_id) {
            return Err(RoomError::NotYourTurn(player_id));
        }
        Ok(())
    }

    fn check_rolled(&self) -> RoomResult<()> {
        if !self.room.dice.rolled() {
            return Err(RoomError::NotRolled);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Message Handlers
// ----------------------------------------------------------------------------
impl RoomActor {
    /// Seats a new player. A [`Subscription`] is returned that will be sent all future
    /// events that happen in this room.
    ///
    /// # Errors
    ///
    /// This function will return an error if the room is already full
    #[instrument(skip(self))]
    fn join_room(&mut self, player_id: PlayerId, name: String) -> RoomResult<Subscription> {
        if self.room.player(player_id).is_some() {
            return Err(RoomError::AlreadyJoined(player_id));
        }
        self.room.add_player(Player::new(player_id, name))?;
        tracing::info!("Player joined room");
        if self.room.started {
            tracing::info!("Room is full, game started");
        }

        // Subscribe early so that this player will receive the events announcing them
        let subscription = self.broadcaster.subscribe();
        tracing::debug!(subscribers = self.broadcaster.subscriber_count());
        self.broadcaster.publish(Event::PlayerJoined);
        self.broadcaster.publish(Event::ScoreUpdated);
        Ok(subscription)
    }

    /// Subscribes a player who already has a seat, e.g. after reconnecting.
    #[instrument(skip(self))]
    fn resume_room(&mut self, player_id: PlayerId) -> RoomResult<Subscription> {
        if self.room.player(player_id).is_none() {
            return Err(RoomError::PlayerInvalid(player_id));
        }
        let subscription = self.broadcaster.subscribe();
        tracing::info!(subscription = subscription.id(), "Player rejoined room");
        Ok(subscription)
    }

    #[instrument(skip(self))]
    fn roll_dice(&mut self, player_id: PlayerId) -> RoomResult<()> {
        self.check_turn(player_id)?;
        if !self.room.roll() {
            return Err(RoomError::NoRollsLeft);
        }
        tracing::info!("Rolled {:?}", self.room.dice.values());

        self.broadcaster.publish(Event::DiceAreaUpdated);
        self.broadcaster.publish(Event::ScoreUpdated);
        Ok(())
    }

    #[instrument(skip(self))]
    fn toggle_die(&mut self, player_id: PlayerId, index: usize) -> RoomResult<()> {
        self.check_turn(player_id)?;
        self.check_rolled()?;
        self.room.toggle_held(index);

        self.broadcaster.publish(Event::DiceAreaUpdated);
        self.broadcaster.publish(Event::ScoreUpdated);
        Ok(())
    }

    #[instrument(skip(self))]
    fn select_cell(&mut self, player_id: PlayerId, row: Row, column: Column) -> RoomResult<()> {
        self.check_turn(player_id)?;
        let player = self
            .room
            .player_mut(player_id)
            .ok_or(RoomError::PlayerInvalid(player_id))?;
        player.score_card.select_cell(row, column)?;
        tracing::debug!("Selected {:?}", player.score_card.selected_cell());

        self.broadcaster.publish(Event::CellSelected);
        Ok(())
    }

    #[instrument(skip(self))]
    fn announce(&mut self, player_id: PlayerId) -> RoomResult<()> {
        self.check_turn(player_id)?;
        self.room
            .player_mut(player_id)
            .ok_or(RoomError::PlayerInvalid(player_id))?
            .score_card
            .announce()?;
        tracing::info!("Player announced");

        self.broadcaster.publish(Event::ScoreAnnounced);
        Ok(())
    }

    /// Writes the selected cell with the current dice and passes the turn on. Once every
    /// scorecard is complete the roster is ordered by score and the game ends.
    #[instrument(skip(self))]
    fn write_score(&mut self, player_id: PlayerId) -> RoomResult<u32> {
        self.check_turn(player_id)?;
        self.check_rolled()?;
        let score = self.room.fill_current().ok_or(RoomError::GameNotStarted)??;
        tracing::info!("Wrote score {score}");

        self.room.end_turn();
        self.broadcaster.publish(Event::TurnEnded);
        self.broadcaster.publish(Event::ScoreUpdated);

        if self.room.game_ended() {
            self.room.sort_by_score();
            tracing::info!(
                "Game ended, {} won with {}",
                self.room.players[0].name,
                self.room.players[0].total_score()
            );
            self.broadcaster.publish(Event::GameEnded);
        }
        Ok(score)
    }
}
