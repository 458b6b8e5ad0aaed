//! Multi-turn reachability ("where can this unit get to")
//!
//! A best-first expansion where a node dominates another when it has more
//! turns left, then more movement left. Nodes are final as soon as they are
//! first reached: costs sit on the hexes being entered, not on edges, so
//! the first arrival is always the best one.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::Serialize;

use crate::battle::battle_map::BattleMap;
use crate::battle::board::GameBoard;
use crate::battle::hex::HexCoord;
use crate::battle::terrain::Terrain;
use crate::battle::units::Unit;
use crate::battle::visibility::{enemy_zoc, get_visible_unit, JammingMap, Viewer};
use crate::core::types::SideId;
use crate::movement::pathfinding::SearchGeneration;
use crate::movement::teleport::{TeleportGraph, VisibilityMode};

/// Parameters of one reachability query
pub struct ReachQuery<'a> {
    pub origin: HexCoord,
    /// Cost of entering a terrain, `None` when unreachable
    pub cost: &'a dyn Fn(Terrain) -> Option<u32>,
    pub movement_left: u32,
    /// Movement points at the start of each further turn
    pub max_movement: u32,
    /// Further turns to simulate after this one
    pub turns: u32,
    pub teleports: Option<&'a TeleportGraph>,
    /// Hexes that cannot be entered at all (visible enemies)
    pub blocked: Option<&'a dyn Fn(HexCoord) -> bool>,
    /// Hexes where movement drops to zero on entry
    pub zoc: Option<&'a dyn Fn(HexCoord) -> bool>,
    /// Extra cost per hex from enemy jamming
    pub jamming: Option<&'a JammingMap>,
    pub collect_edges: bool,
}

impl<'a> ReachQuery<'a> {
    pub fn new(
        origin: HexCoord,
        cost: &'a dyn Fn(Terrain) -> Option<u32>,
        movement_left: u32,
        max_movement: u32,
    ) -> Self {
        Self {
            origin,
            cost,
            movement_left,
            max_movement,
            turns: 0,
            teleports: None,
            blocked: None,
            zoc: None,
            jamming: None,
            collect_edges: false,
        }
    }
}

/// One reachable hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReachableTile {
    pub prev: Option<HexCoord>,
    /// Movement left plus full turns left, in movement points
    pub moves_left: u32,
    pub turns_left: u32,
}

/// Reachable hexes in ascending location order, plus the frontier beyond
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reachability {
    pub destinations: BTreeMap<HexCoord, ReachableTile>,
    pub edges: BTreeSet<HexCoord>,
}

impl Reachability {
    pub fn contains(&self, loc: HexCoord) -> bool {
        self.destinations.contains_key(&loc)
    }

    pub fn get(&self, loc: HexCoord) -> Option<&ReachableTile> {
        self.destinations.get(&loc)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Path from the origin to `loc`, following recorded predecessors
    pub fn route_to(&self, loc: HexCoord) -> Option<Vec<HexCoord>> {
        let mut tile = self.destinations.get(&loc)?;
        let mut route = vec![loc];
        while let Some(prev) = tile.prev {
            route.push(prev);
            tile = self.destinations.get(&prev)?;
            if route.len() > self.destinations.len() {
                return None;
            }
        }
        route.reverse();
        Some(route)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ReachNode {
    movement_left: i64,
    turns_left: i64,
    prev: Option<HexCoord>,
    marker: u32,
}

/// Priority of a frontier node: more turns, then more movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    turns_left: i64,
    movement_left: i64,
    loc: Reverse<HexCoord>,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.turns_left
            .cmp(&other.turns_left)
            .then(self.movement_left.cmp(&other.movement_left))
            .then(self.loc.cmp(&other.loc))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable reachability searcher
#[derive(Debug, Default)]
pub struct ReachabilityCalculator {
    nodes: Vec<ReachNode>,
    generation: SearchGeneration,
}

impl ReachabilityCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute(&mut self, map: &BattleMap, query: &ReachQuery<'_>) -> Reachability {
        let mut result = Reachability::default();
        let Some(origin_index) = map.index(query.origin) else {
            return result;
        };
        if self.generation.advance() || self.nodes.len() != map.len() {
            self.nodes.clear();
            self.nodes.resize(map.len(), ReachNode::default());
        }
        let seen = self.generation.closed();
        let max_moves = i64::from(query.max_movement);

        self.nodes[origin_index] = ReachNode {
            movement_left: i64::from(query.movement_left),
            turns_left: i64::from(query.turns),
            prev: None,
            marker: seen,
        };
        let mut heap = BinaryHeap::new();
        heap.push(Frontier {
            turns_left: i64::from(query.turns),
            movement_left: i64::from(query.movement_left),
            loc: Reverse(query.origin),
        });

        let mut candidates: Vec<HexCoord> = Vec::with_capacity(8);
        while let Some(entry) = heap.pop() {
            let here = entry.loc.0;
            let Some(here_index) = map.index(here) else {
                continue;
            };
            let node = self.nodes[here_index];

            candidates.clear();
            if let Some(tele) = query.teleports {
                candidates.extend(tele.adjacent_links(here));
            }
            candidates.extend(here.neighbors());

            for &next in candidates.iter() {
                let Some(next_index) = map.index(next) else {
                    if query.collect_edges {
                        result.edges.insert(next);
                    }
                    continue;
                };
                if self.nodes[next_index].marker == seen {
                    continue;
                }

                let terrain_cost = map
                    .terrain(next)
                    .and_then(|t| (query.cost)(t))
                    .map(i64::from);
                let Some(mut cost) = terrain_cost else {
                    if query.collect_edges {
                        result.edges.insert(next);
                    }
                    continue;
                };
                if let Some(jam) = query.jamming.and_then(|j| j.get(&next)) {
                    cost += i64::from(*jam);
                }

                let mut movement = node.movement_left - cost;
                let mut turns = node.turns_left;
                if movement < 0 {
                    // Out of movement this turn: finish the step next turn
                    movement = max_moves - cost;
                    turns -= 1;
                }
                if movement < 0 || turns < 0 {
                    if query.collect_edges {
                        result.edges.insert(next);
                    }
                    continue;
                }
                if query.blocked.map_or(false, |blocked| blocked(next)) {
                    if query.collect_edges {
                        result.edges.insert(next);
                    }
                    continue;
                }
                if movement > 0 && query.zoc.map_or(false, |zoc| zoc(next)) {
                    movement = 0;
                }

                self.nodes[next_index] = ReachNode {
                    movement_left: movement,
                    turns_left: turns,
                    prev: Some(here),
                    marker: seen,
                };
                heap.push(Frontier {
                    turns_left: turns,
                    movement_left: movement,
                    loc: Reverse(next),
                });
            }
        }

        for index in 0..self.nodes.len() {
            let node = self.nodes[index];
            if node.marker != seen {
                continue;
            }
            let loc = map.coord_at(index);
            let score = node.movement_left + node.turns_left * max_moves;
            result.destinations.insert(
                loc,
                ReachableTile {
                    prev: node.prev,
                    moves_left: u32::try_from(score).unwrap_or(0),
                    turns_left: u32::try_from(node.turns_left).unwrap_or(0),
                },
            );
        }
        result.edges.retain(|e| !result.destinations.contains_key(e) && map.in_bounds(*e));
        result
    }
}

/// Options for the player-facing move range
#[derive(Debug, Clone, Copy)]
pub struct MoveRangeOptions {
    pub additional_turns: u32,
    pub ignore_zoc: bool,
    pub allow_teleport: bool,
    /// Whose knowledge of the board applies; `None` sees everything
    pub viewing_side: Option<SideId>,
}

impl Default for MoveRangeOptions {
    fn default() -> Self {
        Self {
            additional_turns: 0,
            ignore_zoc: false,
            allow_teleport: true,
            viewing_side: None,
        }
    }
}

/// Hexes `unit` can move to, as shown to the player
pub fn move_range(
    calc: &mut ReachabilityCalculator,
    board: &GameBoard,
    unit: &Unit,
    options: MoveRangeOptions,
) -> Reachability {
    let viewer = options
        .viewing_side
        .map_or(Viewer::SeeAll, Viewer::Side);
    let mode = options
        .viewing_side
        .map_or(VisibilityMode::SeeAll, VisibilityMode::AsSeenBy);
    let teleports = if options.allow_teleport {
        TeleportGraph::build(board, unit, mode, false, false)
    } else {
        TeleportGraph::empty()
    };

    let cost = |t: Terrain| unit.movement_cost(t);
    let blocked = |loc: HexCoord| {
        get_visible_unit(board, loc, viewer).map_or(false, |u| board.is_enemy(unit.side, u.side))
    };
    let zoc = |loc: HexCoord| enemy_zoc(board, unit.side, loc, viewer);
    let ignore_zoc = options.ignore_zoc || unit.skirmisher;

    let mut query = ReachQuery::new(unit.location(), &cost, unit.movement_left, unit.total_movement);
    query.turns = options.additional_turns;
    query.teleports = Some(&teleports);
    query.blocked = Some(&blocked);
    if !ignore_zoc {
        query.zoc = Some(&zoc);
    }
    query.collect_edges = true;
    calc.compute(&board.map, &query)
}

/// Hexes a unit standing at `at` can see this turn
pub fn vision_range(
    calc: &mut ReachabilityCalculator,
    board: &GameBoard,
    unit: &Unit,
    at: HexCoord,
    jamming: &JammingMap,
) -> Reachability {
    let teleports = TeleportGraph::build(board, unit, VisibilityMode::AsSeenBy(unit.side), true, true);
    let cost = |t: Terrain| unit.movement_type.vision_cost(t);
    let vision = unit.vision_points();

    let mut query = ReachQuery::new(at, &cost, vision, vision);
    query.teleports = Some(&teleports);
    query.jamming = Some(jamming);
    query.collect_edges = true;
    calc.compute(&board.map, &query)
}

/// Hexes where `unit` interferes with enemy vision, with remaining strength
pub fn jamming_range(
    calc: &mut ReachabilityCalculator,
    board: &GameBoard,
    unit: &Unit,
) -> Reachability {
    let cost = |t: Terrain| unit.movement_type.jamming_cost(t);
    let query = ReachQuery::new(unit.location(), &cost, unit.jamming, unit.jamming);
    calc.compute(&board.map, &query)
}
