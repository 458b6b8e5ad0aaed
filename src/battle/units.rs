//! Units and the unit registry
//!
//! The registry is keyed two ways: by stable `UnitId` for identity, and by
//! location for board queries. Code that runs across script callbacks keeps
//! only ids and looks units up again afterwards.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::hex::{HexCoord, HexDirection};
use crate::battle::terrain::Terrain;
use crate::battle::unit_type::MovementType;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{SideId, UnitId};
use crate::movement::teleport::TeleportLink;

/// When a unit with a hiding ability is invisible to its enemies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concealment {
    /// Hidden on any terrain
    Always,
    /// Hidden only on terrain that provides concealment
    InCover,
}

/// A stored, resumable remainder of a multi-turn move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotoOrder {
    pub destination: HexCoord,
    /// Remaining route, starting at the hex the unit stopped on
    pub route: Vec<HexCoord>,
}

impl GotoOrder {
    pub fn new(route: Vec<HexCoord>) -> Option<Self> {
        let destination = *route.last()?;
        Some(Self { destination, route })
    }
}

/// A unit on the battle map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub side: SideId,
    location: HexCoord,
    pub facing: HexDirection,
    pub movement_type: MovementType,
    pub total_movement: u32,
    pub movement_left: u32,
    /// Vision points; defaults to total movement
    pub vision: Option<u32>,
    /// Jamming points projected onto enemy vision
    pub jamming: u32,
    pub skirmisher: bool,
    pub concealment: Option<Concealment>,
    /// Custom alert shown when this unit springs an ambush
    pub ambush_alert: Option<String>,
    /// Teleport tunnels granted by this unit's own abilities
    pub tunnels: Vec<TeleportLink>,
    pub emits_zoc: bool,
    pub slowed: bool,
    /// Set once a hidden unit has been revealed
    pub uncovered: bool,
    pub goto: Option<GotoOrder>,
    /// Final hex of a move that was stopped by a sighting
    pub interrupted_move: Option<HexCoord>,
}

impl Unit {
    pub fn new(
        name: impl Into<String>,
        side: SideId,
        location: HexCoord,
        movement_type: MovementType,
        total_movement: u32,
    ) -> Self {
        Self {
            id: UnitId::new(),
            name: name.into(),
            side,
            location,
            facing: HexDirection::default(),
            movement_type,
            total_movement,
            movement_left: total_movement,
            vision: None,
            jamming: 0,
            skirmisher: false,
            concealment: None,
            ambush_alert: None,
            tunnels: Vec::new(),
            emits_zoc: true,
            slowed: false,
            uncovered: false,
            goto: None,
            interrupted_move: None,
        }
    }

    pub fn with_movement_left(mut self, moves: u32) -> Self {
        self.movement_left = moves;
        self
    }

    pub fn with_skirmisher(mut self) -> Self {
        self.skirmisher = true;
        self
    }

    pub fn with_concealment(mut self, concealment: Concealment) -> Self {
        self.concealment = Some(concealment);
        self
    }

    pub fn with_ambush_alert(mut self, alert: impl Into<String>) -> Self {
        self.ambush_alert = Some(alert.into());
        self
    }

    pub fn with_vision(mut self, vision: u32) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_jamming(mut self, jamming: u32) -> Self {
        self.jamming = jamming;
        self
    }

    pub fn with_tunnel(mut self, tunnel: TeleportLink) -> Self {
        self.tunnels.push(tunnel);
        self
    }

    pub fn without_zoc(mut self) -> Self {
        self.emits_zoc = false;
        self
    }

    pub fn location(&self) -> HexCoord {
        self.location
    }

    pub fn vision_points(&self) -> u32 {
        self.vision.unwrap_or(self.total_movement)
    }

    /// Movement cost to enter `terrain`, `None` when unreachable
    pub fn movement_cost(&self, terrain: Terrain) -> Option<u32> {
        self.movement_type.movement_cost(terrain, self.slowed)
    }

    /// Would this unit be hidden standing on `terrain`?
    ///
    /// Only the concealment rule is considered here; who is looking is
    /// decided by the visibility module.
    pub fn is_concealed_on(&self, terrain: Terrain) -> bool {
        if self.uncovered {
            return false;
        }
        match self.concealment {
            None => false,
            Some(Concealment::Always) => true,
            Some(Concealment::InCover) => terrain.provides_concealment(),
        }
    }
}

/// All units on the board, keyed by id and by location
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: AHashMap<UnitId, Unit>,
    positions: BTreeMap<HexCoord, UnitId>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit at its own location
    pub fn insert(&mut self, unit: Unit) -> Result<UnitId> {
        if self.positions.contains_key(&unit.location) {
            return Err(TacticsError::OccupiedHex(unit.location));
        }
        let id = unit.id;
        self.positions.insert(unit.location, id);
        self.units.insert(id, unit);
        Ok(id)
    }

    /// Remove a unit from the board
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.units.remove(&id)?;
        self.positions.remove(&unit.location);
        Some(unit)
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Id of the unit at `loc`, if any
    pub fn find(&self, loc: HexCoord) -> Option<UnitId> {
        self.positions.get(&loc).copied()
    }

    /// The unit at `loc`, if any
    pub fn unit_at(&self, loc: HexCoord) -> Option<&Unit> {
        self.find(loc).and_then(|id| self.units.get(&id))
    }

    /// Move the unit at `from` to `to`
    ///
    /// Fails (returns `None`) when `from` is empty or `to` is occupied.
    pub fn move_unit(&mut self, from: HexCoord, to: HexCoord) -> Option<UnitId> {
        if from == to || self.positions.contains_key(&to) {
            return None;
        }
        let id = self.positions.remove(&from)?;
        self.positions.insert(to, id);
        if let Some(unit) = self.units.get_mut(&id) {
            unit.location = to;
        }
        Some(id)
    }

    /// Place a unit on an arbitrary free hex (used by scripts and undo)
    pub fn relocate(&mut self, id: UnitId, to: HexCoord) -> Result<()> {
        let from = self
            .units
            .get(&id)
            .map(|u| u.location)
            .ok_or(TacticsError::UnitNotFound(id))?;
        if from == to {
            return Ok(());
        }
        self.move_unit(from, to)
            .map(|_| ())
            .ok_or(TacticsError::OccupiedHex(to))
    }

    /// Units in ascending location order
    pub fn iter(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.positions
            .values()
            .filter_map(move |id| self.units.get(id))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
