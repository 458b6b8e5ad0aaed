//! The game context every movement operation runs against
//!
//! There is no global state: map, units, sides, tunnels and configuration
//! travel together in a `GameBoard` passed by reference.

use std::rc::Rc;

use ahash::AHashMap;
use tracing::info;

use crate::battle::battle_map::BattleMap;
use crate::battle::events::{EventPump, GameEvent, GameEventKind};
use crate::battle::hex::HexCoord;
use crate::battle::sides::Side;
use crate::battle::units::{Unit, UnitRegistry};
use crate::battle::visibility::{build_jamming_map, recalculate_fog, JammingMap};
use crate::core::config::MovementConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{SideId, UnitId};
use crate::movement::teleport::TeleportLink;

/// Result of taking a village
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VillageCapture {
    pub previous_owner: Option<SideId>,
    pub time_bonus: bool,
    /// A `capture` handler reported changing the board
    pub mutated: bool,
}

#[derive(Debug, Clone)]
pub struct GameBoard {
    pub map: BattleMap,
    pub units: UnitRegistry,
    sides: Vec<Side>,
    /// Board-wide tunnels available to any unit they allow
    pub tunnels: Vec<TeleportLink>,
    pub config: MovementConfig,
    jamming_cache: AHashMap<SideId, Rc<JammingMap>>,
}

impl GameBoard {
    pub fn new(map: BattleMap) -> Self {
        Self {
            map,
            units: UnitRegistry::new(),
            sides: Vec::new(),
            tunnels: Vec::new(),
            config: MovementConfig::default(),
            jamming_cache: AHashMap::new(),
        }
    }

    pub fn with_config(mut self, config: MovementConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_side(&mut self, side: Side) -> Result<()> {
        if self.side(side.id).is_some() {
            return Err(TacticsError::InvalidConfig(format!("{} defined twice", side.id)));
        }
        self.sides.push(side);
        self.sides.sort_by_key(|s| s.id);
        Ok(())
    }

    pub fn side(&self, id: SideId) -> Option<&Side> {
        self.sides.iter().find(|s| s.id == id)
    }

    pub fn side_mut(&mut self, id: SideId) -> Option<&mut Side> {
        self.sides.iter_mut().find(|s| s.id == id)
    }

    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    /// Unknown sides are treated as hostile to everyone
    pub fn is_enemy(&self, a: SideId, b: SideId) -> bool {
        if a == b {
            return false;
        }
        match (self.side(a), self.side(b)) {
            (Some(sa), Some(sb)) => sa.is_enemy(sb),
            _ => true,
        }
    }

    pub fn village_owner(&self, loc: HexCoord) -> Option<SideId> {
        self.sides.iter().find(|s| s.owns_village(loc)).map(|s| s.id)
    }

    /// Place a unit, checking its side and location
    pub fn add_unit(&mut self, unit: Unit) -> Result<UnitId> {
        if !self.map.in_bounds(unit.location()) {
            return Err(TacticsError::OffBoard(unit.location()));
        }
        if self.side(unit.side).is_none() {
            return Err(TacticsError::UnknownSide(unit.side));
        }
        let id = self.units.insert(unit)?;
        self.clear_status_caches();
        Ok(id)
    }

    /// Enemy jamming as seen by `side`, built on first use
    pub fn jamming_map(&mut self, side: SideId) -> Rc<JammingMap> {
        if let Some(map) = self.jamming_cache.get(&side) {
            return Rc::clone(map);
        }
        let map = Rc::new(build_jamming_map(self, side));
        self.jamming_cache.insert(side, Rc::clone(&map));
        map
    }

    /// Drop state derived from unit positions
    pub fn clear_status_caches(&mut self) {
        self.jamming_cache.clear();
    }

    /// Refresh `side` for a new turn: full movement, hidden units re-hide,
    /// fog recomputed
    pub fn start_turn(&mut self, side: SideId) -> Result<()> {
        let s = self.side_mut(side).ok_or(TacticsError::UnknownSide(side))?;
        s.action_bonus_count = 0;
        let ids: Vec<UnitId> = self
            .units
            .iter()
            .filter(|u| u.side == side)
            .map(|u| u.id)
            .collect();
        for id in ids {
            if let Some(unit) = self.units.get_mut(id) {
                unit.movement_left = unit.total_movement;
                unit.uncovered = false;
            }
        }
        self.clear_status_caches();
        recalculate_fog(self, side);
        Ok(())
    }

    /// Give the village at `loc` to `side`
    ///
    /// Other sides lose it; a defeated capturer only strips it from enemies
    /// and does not take ownership. Fires `capture` when `unit` is given.
    pub fn capture_village(
        &mut self,
        events: &mut dyn EventPump,
        loc: HexCoord,
        side: SideId,
        unit: Option<UnitId>,
    ) -> VillageCapture {
        let mut capture = VillageCapture::default();
        let Some(capturer) = self.side(side) else {
            return capture;
        };
        if capturer.owns_village(loc) {
            return capture;
        }
        let defeated = capturer.defeated;
        let capturer_team = capturer.team.clone();

        for other in self.sides.iter_mut().filter(|s| s.id != side) {
            if defeated && other.team == capturer_team {
                continue;
            }
            if other.lose_village(loc) {
                capture.previous_owner = Some(other.id);
            }
        }
        if defeated {
            return capture;
        }

        let time_bonus = self.config.village_time_bonus;
        if let Some(capturer) = self.side_mut(side) {
            capturer.gain_village(loc);
            if time_bonus {
                capturer.action_bonus_count += 1;
                capture.time_bonus = true;
            }
        }
        info!(%side, village = %loc, previous = ?capture.previous_owner, "village captured");

        if unit.is_some() {
            let event = GameEvent::new(GameEventKind::Capture, unit, loc)
                .with_previous_owner(capture.previous_owner);
            capture.mutated = events.fire(self, &event);
        }
        capture
    }
}
