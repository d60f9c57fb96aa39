use tokio::sync::{mpsc, oneshot};
use yamb_lib::{
    room::Room,
    scorecard::{Column, Row},
    PlayerId, RoomId,
};

use super::broadcaster::{Broadcaster, Subscription};
use super::RoomError;
use super::{room_actor::RoomAction, RoomResult};

/// Held by the server's room registry. It doesn't keep the room alive, but can hand out
/// handles that do for as long as the room is still open.
#[derive(Clone, Debug)]
pub struct RoomHandleProvider {
    pub(super) sender: mpsc::WeakSender<RoomAction>,
    pub(super) broadcaster: Broadcaster,
    pub(super) room_id: RoomId,
}

impl RoomHandleProvider {
    pub fn into_handle(self, player_id: impl Into<PlayerId>) -> RoomResult<RoomHandle> {
        Ok(RoomHandle {
            sender: self.sender.upgrade().ok_or(RoomError::HandleInvalid)?,
            room_id: self.room_id,
            player_id: player_id.into(),
        })
    }

    /// Watch a room without taking a seat in it.
    pub fn spectate(&self) -> RoomResult<Subscription> {
        if self.sender.upgrade().is_none() {
            return Err(RoomError::HandleInvalid);
        }
        Ok(self.broadcaster.subscribe())
    }

    /// A copy of the room as it is right now.
    pub async fn snapshot(&self) -> RoomResult<Room> {
        let sender = self.sender.upgrade().ok_or(RoomError::HandleInvalid)?;
        request_snapshot(&sender).await
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }
}

async fn request_snapshot(sender: &mpsc::Sender<RoomAction>) -> RoomResult<Room> {
    let (tx, rx) = oneshot::channel();
    let _ = sender.send(RoomAction::Snapshot { respond_to: tx }).await;
    rx.await.map_err(|_| RoomError::HandleInvalid)
}

/// A player's way into their room. The room stays open while any handle exists.
#[derive(Debug)]
pub struct RoomHandle {
    pub(super) sender: mpsc::Sender<RoomAction>,
    pub(super) room_id: RoomId,
    pub(super) player_id: PlayerId,
}

impl RoomHandle {
    async fn execute<T>(
        &self,
        msg: RoomAction,
        rx: oneshot::Receiver<Result<T, RoomError>>,
    ) -> Result<T, RoomError> {
        // Ignore first error, if there is an error, rx.await will fail as well since it's sender
        // will have been dropped
        let _ = self.sender.send(msg).await;
        rx.await.unwrap_or(Err(RoomError::HandleInvalid))
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Takes a seat in this room under `name`.
    pub async fn join_room(&self, name: String) -> RoomResult<Subscription> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::Join {
            respond_to: tx,
            id: self.player_id,
            name,
        };
        self.execute(msg, rx).await
    }

    /// Goes back to a seat this handle's player already holds.
    pub async fn resume_room(&self) -> RoomResult<Subscription> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::Resume {
            respond_to: tx,
            id: self.player_id,
        };
        self.execute(msg, rx).await
    }

    pub async fn roll_dice(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::RollDice {
            respond_to: tx,
            id: self.player_id,
        };
        self.execute(msg, rx).await
    }

    pub async fn toggle_die(&self, index: usize) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::ToggleDie {
            respond_to: tx,
            id: self.player_id,
            index,
        };
        self.execute(msg, rx).await
    }

    pub async fn select_cell(&self, row: Row, column: Column) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::SelectCell {
            respond_to: tx,
            id: self.player_id,
            row,
            column,
        };
        self.execute(msg, rx).await
    }

    pub async fn announce(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::Announce {
            respond_to: tx,
            id: self.player_id,
        };
        self.execute(msg, rx).await
    }

    /// Returns the score written.
    pub async fn write_score(&self) -> RoomResult<u32> {
        let (tx, rx) = oneshot::channel();
        let msg = RoomAction::WriteScore {
            respond_to: tx,
            id: self.player_id,
        };
        self.execute(msg, rx).await
    }

    pub async fn snapshot(&self) -> RoomResult<Room> {
        request_snapshot(&self.sender).await
    }
}
