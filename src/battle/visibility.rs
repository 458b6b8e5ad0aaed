//! Per-side visibility: fog, shroud, hidden units, zones of control, jamming
//!
//! Each side keeps its own fog state. Vision is projected with the vision
//! parameterization of the reachability search, reduced by enemy jamming.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::board::GameBoard;
use crate::battle::events::{EventPump, GameEvent, GameEventKind};
use crate::battle::hex::HexCoord;
use crate::battle::units::Unit;
use crate::core::types::{SideId, UnitId};
use crate::movement::reachability::{jamming_range, vision_range, ReachabilityCalculator};
use crate::movement::spectator::{MoveSpectator, NoopSpectator};

/// Who is looking at the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Fog, shroud and concealment are ignored
    SeeAll,
    Side(SideId),
}

/// Fog and shroud state for one side
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideVision {
    /// Hexes cleared of fog this turn
    visible: BTreeSet<HexCoord>,
    /// Hexes ever seen (cleared of shroud)
    remembered: BTreeSet<HexCoord>,
}

impl SideVision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is this hex currently visible?
    pub fn is_visible(&self, coord: HexCoord) -> bool {
        self.visible.contains(&coord)
    }

    /// Has this hex been seen before?
    pub fn is_remembered(&self, coord: HexCoord) -> bool {
        self.remembered.contains(&coord)
    }

    pub fn clear(&mut self, coord: HexCoord) {
        self.visible.insert(coord);
        self.remembered.insert(coord);
    }

    /// Fog everything again; shroud stays cleared
    pub fn reset_fog(&mut self) {
        self.visible.clear();
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }
}

/// Remaining enemy jamming points per hex, as seen by one side
pub type JammingMap = BTreeMap<HexCoord, u32>;

/// Is `unit` hidden from `viewer` where it stands?
pub fn is_invisible_to(board: &GameBoard, unit: &Unit, viewer: SideId) -> bool {
    let Some(terrain) = board.map.terrain(unit.location()) else {
        return false;
    };
    unit.is_concealed_on(terrain) && board.is_enemy(viewer, unit.side)
}

/// The unit at `loc` if `viewer` can see it
pub fn get_visible_unit(board: &GameBoard, loc: HexCoord, viewer: Viewer) -> Option<&Unit> {
    let unit = board.units.unit_at(loc)?;
    match viewer {
        Viewer::SeeAll => Some(unit),
        Viewer::Side(side) => {
            let fogged = board.side(side).map_or(false, |s| s.fogged(loc));
            if fogged || is_invisible_to(board, unit, side) {
                None
            } else {
                Some(unit)
            }
        }
    }
}

pub fn has_visible_unit(board: &GameBoard, loc: HexCoord, viewer: SideId) -> bool {
    get_visible_unit(board, loc, Viewer::Side(viewer)).is_some()
}

/// Is `loc` inside a zone of control exerted against `side`?
///
/// Only enemies that `viewer` can see count.
pub fn enemy_zoc(board: &GameBoard, side: SideId, loc: HexCoord, viewer: Viewer) -> bool {
    loc.neighbors().iter().any(|&adj| {
        get_visible_unit(board, adj, viewer)
            .map_or(false, |u| u.emits_zoc && board.is_enemy(side, u.side))
    })
}

/// Build the jamming overlay that enemy jammers project onto `viewer`
pub fn build_jamming_map(board: &GameBoard, viewer: SideId) -> JammingMap {
    let mut jamming = JammingMap::new();
    let mut calc = ReachabilityCalculator::new();
    for unit in board.units.iter() {
        if unit.jamming == 0 || !board.is_enemy(viewer, unit.side) {
            continue;
        }
        let reach = jamming_range(&mut calc, board, unit);
        for (loc, tile) in reach.destinations.iter() {
            let entry = jamming.entry(*loc).or_insert(0);
            if *entry < tile.moves_left {
                *entry = tile.moves_left;
            }
        }
    }
    jamming
}

/// What one clearing pass revealed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearResult {
    /// Some hex lost its fog or shroud
    pub cleared: bool,
    pub enemies: usize,
    pub friends: usize,
}

/// Clears fog around moving units and queues the resulting `sighted` events
///
/// Events are held back until `fire_events` so a unit clearing several hexes
/// in one step does not fire scripts in the middle of the step.
#[derive(Debug, Default)]
pub struct ShroudClearer {
    reach: ReachabilityCalculator,
    pending: Vec<GameEvent>,
}

impl ShroudClearer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear fog for `unit_id`'s side as if the unit stood at `at`
    ///
    /// Units that become visible are counted as enemies or friends of the
    /// clearing side and reported to the spectator.
    pub fn clear_unit(
        &mut self,
        board: &mut GameBoard,
        unit_id: UnitId,
        at: HexCoord,
        spectator: &mut dyn MoveSpectator,
    ) -> ClearResult {
        let Some(side) = board.units.get(unit_id).map(|u| u.side) else {
            return ClearResult::default();
        };
        let jamming = board.jamming_map(side);
        let hexes: Vec<HexCoord> = {
            let Some(unit) = board.units.get(unit_id) else {
                return ClearResult::default();
            };
            let reach = vision_range(&mut self.reach, board, unit, at, &jamming);
            reach
                .destinations
                .keys()
                .chain(reach.edges.iter())
                .copied()
                .collect()
        };

        let newly: Vec<HexCoord> = match board.side_mut(side) {
            Some(s) if s.fog_or_shroud() => hexes.into_iter().filter(|&h| s.clear(h)).collect(),
            _ => return ClearResult::default(),
        };

        let mut result = ClearResult {
            cleared: !newly.is_empty(),
            ..ClearResult::default()
        };
        for loc in newly {
            let Some(seen) = board.units.unit_at(loc) else {
                continue;
            };
            if seen.id == unit_id || is_invisible_to(board, seen, side) {
                continue;
            }
            if board.is_enemy(side, seen.side) {
                result.enemies += 1;
                spectator.add_seen_enemy(seen.id);
            } else {
                result.friends += 1;
                spectator.add_seen_friend(seen.id);
            }
            self.pending.push(
                GameEvent::new(GameEventKind::Sighted, Some(seen.id), loc).with_secondary(at),
            );
        }
        if result.enemies + result.friends > 0 {
            debug!(
                %side,
                at = %at,
                enemies = result.enemies,
                friends = result.friends,
                "units sighted"
            );
        }
        result
    }

    /// Queue a `sighted` event raised outside fog clearing (ambush reveals)
    pub fn queue_sighted(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Fire queued `sighted` events; returns whether any reported a mutation
    ///
    /// Events for units that no longer exist are dropped.
    pub fn fire_events(&mut self, board: &mut GameBoard, events: &mut dyn EventPump) -> bool {
        let mut mutated = false;
        for event in std::mem::take(&mut self.pending) {
            if event.unit.map_or(false, |id| !board.units.contains(id)) {
                continue;
            }
            mutated |= events.fire(board, &event);
        }
        mutated
    }
}

/// Recompute `side`'s fog from scratch using all of its units
pub fn recalculate_fog(board: &mut GameBoard, side: SideId) {
    let Some(s) = board.side_mut(side) else {
        return;
    };
    if !s.fog_or_shroud() {
        return;
    }
    s.vision.reset_fog();

    let own: Vec<(UnitId, HexCoord)> = board
        .units
        .iter()
        .filter(|u| u.side == side)
        .map(|u| (u.id, u.location()))
        .collect();
    let mut clearer = ShroudClearer::new();
    let mut quiet = NoopSpectator;
    for (id, loc) in own {
        clearer.clear_unit(board, id, loc, &mut quiet);
    }
}
