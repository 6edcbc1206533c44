//! Game implementations.

pub mod ludo;

use serde::{Deserialize, Serialize};

/// Game categories offered by the server; matchmaking queues are kept per category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GameCategory {
    /// Four-color race-and-capture board game for 2-4 participants.
    Ludo,
}

impl GameCategory {
    /// Smallest group that can play.
    pub fn min_players(self) -> usize {
        match self {
            Self::Ludo => 2,
        }
    }

    /// Largest group that can play.
    pub fn max_players(self) -> usize {
        match self {
            Self::Ludo => 4,
        }
    }

    /// Clamps a requested group size to what the category supports.
    pub fn clamp_group_size(self, requested: usize) -> usize {
        requested.clamp(self.min_players(), self.max_players())
    }
}
