//! Observer hooks for automated movers
//!
//! An AI driving a move wants to know what happened (who ambushed it, what
//! it saw) without going through the player-facing alerts.

use crate::core::types::UnitId;

pub trait MoveSpectator {
    fn set_unit(&mut self, _unit: UnitId) {}
    fn set_ambusher(&mut self, _unit: UnitId) {}
    fn set_failed_teleport(&mut self, _unit: UnitId) {}
    fn add_seen_enemy(&mut self, _unit: UnitId) {}
    fn add_seen_friend(&mut self, _unit: UnitId) {}
}

/// Ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpectator;

impl MoveSpectator for NoopSpectator {}

/// Records everything it is told
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpectatorLog {
    pub unit: Option<UnitId>,
    pub ambusher: Option<UnitId>,
    pub failed_teleport: Option<UnitId>,
    pub seen_enemies: Vec<UnitId>,
    pub seen_friends: Vec<UnitId>,
}

impl SpectatorLog {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl MoveSpectator for SpectatorLog {
    fn set_unit(&mut self, unit: UnitId) {
        self.unit = Some(unit);
    }

    fn set_ambusher(&mut self, unit: UnitId) {
        self.ambusher = Some(unit);
    }

    fn set_failed_teleport(&mut self, unit: UnitId) {
        self.failed_teleport = Some(unit);
    }

    fn add_seen_enemy(&mut self, unit: UnitId) {
        self.seen_enemies.push(unit);
    }

    fn add_seen_friend(&mut self, unit: UnitId) {
        self.seen_friends.push(unit);
    }
}
