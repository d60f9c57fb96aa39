use serde::{Deserialize, Serialize};

use crate::{scorecard::ScoreCard, PlayerId};

/// Teams are handed out in join order.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Team {
    Blue,
    Red,
    Yellow,
    Green,
}

impl Team {
    pub const ALL: [Team; 4] = [Team::Blue, Team::Red, Team::Yellow, Team::Green];

    pub fn from_join_order(order: usize) -> Self {
        Self::ALL[order % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score_card: ScoreCard,
    pub team: Team,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score_card: ScoreCard::new(),
            team: Team::Blue,
        }
    }

    pub fn total_score(&self) -> u32 {
        self.score_card.total_score()
    }
}
