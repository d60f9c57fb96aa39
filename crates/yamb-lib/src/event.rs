use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Something in a room changed. Events carry no data, subscribers re-read the room to see what.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Event {
    PlayerJoined,
    ScoreUpdated,
    DiceAreaUpdated,
    CellSelected,
    TurnEnded,
    ScoreAnnounced,
    GameEnded,
}

impl Event {
    /// Name used when pushing the event to a client.
    pub fn name(self) -> &'static str {
        match self {
            Event::PlayerJoined => "playerJoined",
            Event::ScoreUpdated => "scoreUpdated",
            Event::DiceAreaUpdated => "diceAreaUpdated",
            Event::CellSelected => "cellSelected",
            Event::TurnEnded => "turnEnded",
            Event::ScoreAnnounced => "scoreAnnounced",
            Event::GameEnded => "gameEnded",
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
