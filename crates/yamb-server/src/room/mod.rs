use thiserror::Error;
use tokio::sync::mpsc;
use yamb_lib::{
    net::ProtocolError,
    room::{RoomFull, RoomOptions},
    scorecard::ScoreCardError,
    PlayerId, RoomId,
};

use crate::state::OwnedId;

use self::{
    broadcaster::Broadcaster,
    room_actor::RoomActor,
    room_handle::{RoomHandle, RoomHandleProvider},
};

pub mod broadcaster;
mod room_actor;
pub mod room_handle;

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error(transparent)]
    RoomFull(#[from] RoomFull),
    #[error("Action attempted by Player {0:#} who is not in this room")]
    PlayerInvalid(PlayerId),
    #[error("Player {0:#} already has a seat in this room")]
    AlreadyJoined(PlayerId),
    #[error("It is not Player {0:#}'s turn")]
    NotYourTurn(PlayerId),
    #[error("The game starts once every seat is taken")]
    GameNotStarted,
    #[error("The game is over")]
    GameOver,
    #[error("No rolls are left this turn")]
    NoRollsLeft,
    #[error("The dice haven't been rolled this turn")]
    NotRolled,
    #[error(transparent)]
    ScoreCard(#[from] ScoreCardError),
    #[error("The Room Handle is no longer connected to a room.")]
    HandleInvalid,
}

impl From<RoomError> for ProtocolError {
    fn from(v: RoomError) -> Self {
        Self::Message(v.to_string())
    }
}

pub type RoomResult<T> = Result<T, RoomError>;

/// Spawn the actor for a new room. The host gets the only strong handle to start with;
/// the room closes once every strong handle is gone.
pub fn start_new_room(
    id: OwnedId<RoomId>,
    options: RoomOptions,
    host_id: PlayerId,
) -> (RoomHandleProvider, RoomHandle) {
    let (sender, receiver) = mpsc::channel(64);
    let broadcaster = Broadcaster::default();
    let provider = RoomHandleProvider {
        sender: sender.downgrade(),
        broadcaster: broadcaster.clone(),
        room_id: *id,
    };
    let handle = RoomHandle {
        sender,
        room_id: *id,
        player_id: host_id,
    };
    let actor = RoomActor::new(receiver, id, options, broadcaster);
    tokio::spawn(actor.run());

    (provider, handle)
}
