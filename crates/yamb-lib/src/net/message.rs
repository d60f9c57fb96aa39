use crate::event::Event;
use crate::room::{Room, RoomOptions};
use crate::scorecard::{Column, Row};
use crate::{PlayerId, RoomId};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub enum Message {
    Error { error: ProtocolError },
    Version { version: String },
    ConnectionAccept { player_id: PlayerId },
    RoomCreate { options: RoomOptions, name: String },
    RoomJoin { room_id: RoomId, name: String },
    /// Take a seat again after reconnecting, as the player who held it before.
    RoomResume { room_id: RoomId, player_id: PlayerId },
    RoomSpectate { room_id: RoomId },
    RoomJoined { room_id: RoomId, player_id: PlayerId },
    Room(RoomMessage),
    Event { event: Event },
    RoomInfo { room: Room },
}

impl From<RoomMessage> for Message {
    fn from(msg: RoomMessage) -> Self {
        Self::Room(msg)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Self::Event { event }
    }
}

/// Actions taken by a seated player.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum RoomMessage {
    RollDice,
    ToggleDie { index: usize },
    SelectCell { row: Row, column: Column },
    Announce,
    WriteScore,
    /// Ask for a fresh `RoomInfo`.
    Refresh,
}
