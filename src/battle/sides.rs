//! Playing sides: team membership, villages, and fog/shroud settings

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::battle::hex::HexCoord;
use crate::battle::visibility::SideVision;
use crate::core::types::SideId;

/// One playing side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Side {
    pub id: SideId,
    /// Sides sharing a team name are allies
    pub team: String,
    pub fog: bool,
    pub shroud: bool,
    /// When false, shroud clearing during a move is postponed
    pub auto_shroud_updates: bool,
    pub defeated: bool,
    /// Action time bonuses earned this turn (village captures)
    pub action_bonus_count: u32,
    villages: BTreeSet<HexCoord>,
    pub vision: SideVision,
}

impl Side {
    pub fn new(id: SideId, team: impl Into<String>) -> Self {
        Self {
            id,
            team: team.into(),
            fog: false,
            shroud: false,
            auto_shroud_updates: true,
            defeated: false,
            action_bonus_count: 0,
            villages: BTreeSet::new(),
            vision: SideVision::new(),
        }
    }

    pub fn with_fog(mut self) -> Self {
        self.fog = true;
        self
    }

    pub fn with_shroud(mut self) -> Self {
        self.shroud = true;
        self
    }

    pub fn is_enemy(&self, other: &Side) -> bool {
        self.team != other.team
    }

    pub fn fog_or_shroud(&self) -> bool {
        self.fog || self.shroud
    }

    /// Is `loc` hidden by shroud (never seen)?
    pub fn shrouded(&self, loc: HexCoord) -> bool {
        self.shroud && !self.vision.is_remembered(loc)
    }

    /// Is `loc` hidden by fog or shroud right now?
    pub fn fogged(&self, loc: HexCoord) -> bool {
        self.shrouded(loc) || (self.fog && !self.vision.is_visible(loc))
    }

    /// Clear fog and shroud at `loc`; returns whether it was hidden before
    pub fn clear(&mut self, loc: HexCoord) -> bool {
        let was_hidden = self.fogged(loc);
        self.vision.clear(loc);
        was_hidden
    }

    pub fn owns_village(&self, loc: HexCoord) -> bool {
        self.villages.contains(&loc)
    }

    pub fn gain_village(&mut self, loc: HexCoord) {
        self.villages.insert(loc);
    }

    pub fn lose_village(&mut self, loc: HexCoord) -> bool {
        self.villages.remove(&loc)
    }

    pub fn villages(&self) -> impl Iterator<Item = &HexCoord> + '_ {
        self.villages.iter()
    }
}
