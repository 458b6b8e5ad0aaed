//! A* route search over the hex grid
//!
//! The node array is allocated once per `RouteFinder` and reused between
//! searches. Instead of clearing it, every node carries the generation it
//! was last touched in: `generation + 1` while it sits in the open set,
//! `generation` once closed. Anything else is left over from an earlier
//! search and is treated as unvisited.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use ordered_float::OrderedFloat;
use tracing::{debug, trace};

use crate::battle::battle_map::BattleMap;
use crate::battle::board::GameBoard;
use crate::battle::hex::HexCoord;
use crate::battle::units::Unit;
use crate::battle::visibility::{enemy_zoc, get_visible_unit, Viewer};
use crate::core::error::{Result, TacticsError};
use crate::core::types::{SideId, UnitId};
use crate::movement::teleport::{TeleportGraph, VisibilityMode};

/// Cost reported for hexes that cannot be entered
pub const NO_PATH_COST: f64 = 42_424_242.0;

/// Cost of entering a hex during a search
pub trait CostCalculator {
    /// Cost of entering `loc` after `so_far` has already been spent
    fn cost(&self, loc: HexCoord, so_far: f64) -> f64;

    fn no_path_value(&self) -> f64 {
        NO_PATH_COST
    }
}

/// Search generation shared by the grid searches
///
/// Starts at zero, which is reserved for "never touched".
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SearchGeneration(u32);

impl SearchGeneration {
    pub(crate) const UNINITIALIZED: u32 = 0;

    /// Start a new search; returns true when the node array must be wiped
    /// because the counter wrapped around
    pub(crate) fn advance(&mut self) -> bool {
        self.0 = self.0.wrapping_add(2);
        if self.0.wrapping_sub(Self::UNINITIALIZED) <= 1 {
            self.0 = Self::UNINITIALIZED + 2;
            return true;
        }
        false
    }

    pub(crate) fn closed(&self) -> u32 {
        self.0
    }

    pub(crate) fn open(&self) -> u32 {
        self.0.wrapping_add(1)
    }

    /// Was `marker` written during the current search?
    pub(crate) fn touched(&self, marker: u32) -> bool {
        marker.wrapping_sub(self.0) <= 1
    }
}

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    g: f64,
    h: f64,
    t: f64,
    prev: Option<HexCoord>,
    marker: u32,
}

impl Default for SearchNode {
    fn default() -> Self {
        Self {
            g: 0.0,
            h: 0.0,
            t: 0.0,
            prev: None,
            marker: SearchGeneration::UNINITIALIZED,
        }
    }
}

/// Entry in the A* open set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    t: OrderedFloat<f64>,
    loc: HexCoord,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; ties go to the smaller location
        other.t.cmp(&self.t).then_with(|| other.loc.cmp(&self.loc))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A found route and its integer cost
#[derive(Debug, Clone, PartialEq)]
pub struct PlainRoute {
    pub steps: Vec<HexCoord>,
    pub move_cost: i64,
}

impl PlainRoute {
    pub fn no_path() -> Self {
        Self {
            steps: Vec::new(),
            move_cost: NO_PATH_COST as i64,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Straight-line estimate with a tiny bonus for visually straight paths
pub fn heuristic(from: HexCoord, to: HexCoord) -> f64 {
    f64::from(from.distance(&to)) + from.screen_distance_sq(&to) / 900_000_000.0
}

/// Reusable A* searcher
#[derive(Debug, Default)]
pub struct RouteFinder {
    nodes: Vec<SearchNode>,
    generation: SearchGeneration,
}

impl RouteFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the cheapest route from `src` to `dst`
    ///
    /// Routes costing more than `stop_at` are not found. With teleports the
    /// estimate is lowered to "walk to a tunnel, walk from a tunnel exit",
    /// which may overestimate slightly; that trade is accepted.
    pub fn search(
        &mut self,
        map: &BattleMap,
        src: HexCoord,
        dst: HexCoord,
        stop_at: f64,
        calc: &dyn CostCalculator,
        teleports: Option<&TeleportGraph>,
    ) -> PlainRoute {
        if !map.in_bounds(src) || !map.in_bounds(dst) {
            debug!(%src, %dst, "route endpoint off the board");
            return PlainRoute::no_path();
        }
        if src == dst {
            return PlainRoute {
                steps: vec![src],
                move_cost: 0,
            };
        }
        if calc.cost(dst, 0.0) >= stop_at {
            trace!(%dst, "destination cannot be entered");
            return PlainRoute::no_path();
        }

        let teleports = teleports.filter(|t| !t.is_empty());
        let tunnel_sources: BTreeSet<HexCoord> =
            teleports.map(|t| t.sources()).unwrap_or_default();
        // Cheapest walk from any tunnel exit to the goal; independent of the node
        let exit_to_goal = teleports
            .map(|t| {
                t.targets()
                    .iter()
                    .map(|&exit| heuristic(exit, dst))
                    .fold(f64::INFINITY, f64::min)
            })
            .unwrap_or(f64::INFINITY);
        let estimate = |loc: HexCoord| -> f64 {
            let h = heuristic(loc, dst);
            if tunnel_sources.is_empty() {
                return h;
            }
            let to_tunnel = tunnel_sources
                .iter()
                .map(|&s| heuristic(loc, s))
                .fold(f64::INFINITY, f64::min);
            h.min(to_tunnel + exit_to_goal + 1.0)
        };

        if self.generation.advance() || self.nodes.len() != map.len() {
            self.nodes.clear();
            self.nodes.resize(map.len(), SearchNode::default());
        }
        let (Some(src_index), Some(dst_index)) = (map.index(src), map.index(dst)) else {
            return PlainRoute::no_path();
        };

        let open = self.generation.open();
        let closed = self.generation.closed();
        let h = estimate(src);
        self.nodes[src_index] = SearchNode {
            g: 0.0,
            h,
            t: h,
            prev: None,
            marker: open,
        };
        let mut heap = BinaryHeap::new();
        heap.push(OpenEntry {
            t: OrderedFloat(h),
            loc: src,
        });

        let mut candidates: Vec<HexCoord> = Vec::with_capacity(8);
        while let Some(entry) = heap.pop() {
            let Some(index) = map.index(entry.loc) else {
                continue;
            };
            let node = self.nodes[index];
            // Stale entry for a node since improved or already expanded
            if node.marker != open || OrderedFloat(node.t) != entry.t {
                continue;
            }
            self.nodes[index].marker = closed;

            let goal = self.nodes[dst_index];
            let goal_g = if self.generation.touched(goal.marker) {
                goal.g
            } else {
                stop_at + 1.0
            };
            if node.t >= goal_g {
                break;
            }

            candidates.clear();
            if let Some(tele) = teleports {
                candidates.extend(tele.adjacent_links(entry.loc));
            }
            candidates.extend(entry.loc.neighbors());

            for &loc in candidates.iter() {
                let Some(next_index) = map.index(loc) else {
                    continue;
                };
                if loc == entry.loc {
                    continue;
                }
                let next = self.nodes[next_index];
                let thresh = if self.generation.touched(next.marker) {
                    next.g
                } else {
                    stop_at + 1.0
                };
                // Every step costs at least one
                if node.g + 1.0 >= thresh {
                    continue;
                }
                let cost = node.g + calc.cost(loc, node.g);
                if cost >= thresh {
                    continue;
                }
                let h = estimate(loc);
                self.nodes[next_index] = SearchNode {
                    g: cost,
                    h,
                    t: cost + h,
                    prev: Some(entry.loc),
                    marker: open,
                };
                heap.push(OpenEntry {
                    t: OrderedFloat(cost + h),
                    loc,
                });
            }
        }

        let goal = self.nodes[dst_index];
        if !self.generation.touched(goal.marker) || goal.g > stop_at {
            trace!(%src, %dst, "no route found");
            return PlainRoute::no_path();
        }

        let mut steps = vec![dst];
        let mut curr = goal.prev;
        while let Some(loc) = curr {
            steps.push(loc);
            if steps.len() > self.nodes.len() {
                return PlainRoute::no_path();
            }
            curr = map.index(loc).and_then(|i| self.nodes[i].prev);
        }
        steps.reverse();
        debug!(%src, %dst, cost = goal.g, hexes = steps.len(), "route found");
        PlainRoute {
            steps,
            move_cost: goal.g as i64,
        }
    }
}

/// Route costs for a unit, turn by turn
///
/// Movement wasted at the end of a turn is charged to the route, and so is
/// the rest of a turn's movement when entering an enemy zone of control.
/// A tiny sub-cost prefers terrain with better defense and hexes without
/// friendly units in the way.
pub struct ShortestPathCalculator<'a> {
    board: &'a GameBoard,
    unit: &'a Unit,
    viewer: SideId,
    see_all: bool,
    ignore_units: bool,
    ignore_defense: bool,
    movement_left: i64,
    total_movement: i64,
}

impl<'a> ShortestPathCalculator<'a> {
    pub fn new(board: &'a GameBoard, unit: &'a Unit, viewer: SideId) -> Self {
        Self {
            board,
            unit,
            viewer,
            see_all: false,
            ignore_units: false,
            ignore_defense: !board.config.defense_tiebreak,
            movement_left: i64::from(unit.movement_left),
            total_movement: i64::from(unit.total_movement),
        }
    }

    pub fn see_all(mut self) -> Self {
        self.see_all = true;
        self
    }

    pub fn ignore_units(mut self) -> Self {
        self.ignore_units = true;
        self
    }

    pub fn ignore_defense(mut self) -> Self {
        self.ignore_defense = true;
        self
    }

    fn viewer(&self) -> Viewer {
        if self.see_all {
            Viewer::SeeAll
        } else {
            Viewer::Side(self.viewer)
        }
    }
}

impl CostCalculator for ShortestPathCalculator<'_> {
    fn cost(&self, loc: HexCoord, so_far: f64) -> f64 {
        let no_path = self.no_path_value();
        let Some(terrain) = self.board.map.terrain(loc) else {
            return no_path;
        };
        if !self.see_all && self.board.side(self.viewer).map_or(false, |s| s.shrouded(loc)) {
            return no_path;
        }
        let Some(terrain_cost) = self.unit.movement_cost(terrain) else {
            return no_path;
        };
        let terrain_cost = i64::from(terrain_cost);
        if self.total_movement < terrain_cost {
            return no_path;
        }

        let mut other_unit_subcost = 0.0;
        if !self.ignore_units {
            if let Some(other) = get_visible_unit(self.board, loc, self.viewer()) {
                if self.board.is_enemy(self.unit.side, other.side) {
                    return no_path;
                }
                other_unit_subcost = 1.0;
            }
        }

        // Movement left in the turn during which `loc` is entered
        let mut remaining = self.movement_left - so_far as i64;
        if remaining < 0 {
            remaining = self.total_movement - (-remaining) % self.total_movement;
        }
        let mut move_cost = 0;
        if remaining < terrain_cost {
            move_cost += remaining;
            remaining = self.total_movement;
        }
        if !self.ignore_units
            && remaining != terrain_cost
            && !self.unit.skirmisher
            && enemy_zoc(self.board, self.unit.side, loc, self.viewer())
        {
            move_cost += remaining;
        } else {
            move_cost += terrain_cost;
        }

        let defense_subcost = if self.ignore_defense {
            0.0
        } else {
            f64::from(self.unit.movement_type.hit_chance(terrain))
        };
        move_cost as f64 + (defense_subcost + other_unit_subcost) / 10_000.0
    }
}

/// Every hex costs one; used by tooling and tests
pub struct UniformCost;

impl CostCalculator for UniformCost {
    fn cost(&self, _loc: HexCoord, _so_far: f64) -> f64 {
        1.0
    }
}

/// Plan a multi-turn route for a unit as its own side sees the board
pub fn plan_route(
    finder: &mut RouteFinder,
    board: &GameBoard,
    unit_id: UnitId,
    goal: HexCoord,
) -> Result<PlainRoute> {
    let unit = board
        .units
        .get(unit_id)
        .ok_or(TacticsError::UnitNotFound(unit_id))?;
    let calc = ShortestPathCalculator::new(board, unit, unit.side);
    let teleports =
        TeleportGraph::build(board, unit, VisibilityMode::AsSeenBy(unit.side), false, false);
    let turns = board.config.max_route_turns.saturating_sub(1);
    let budget = u64::from(unit.movement_left) + u64::from(unit.total_movement) * u64::from(turns);
    let stop_at = (budget as f64 + 1.0).min(calc.no_path_value());
    Ok(finder.search(
        &board.map,
        unit.location(),
        goal,
        stop_at,
        &calc,
        Some(&teleports),
    ))
}
