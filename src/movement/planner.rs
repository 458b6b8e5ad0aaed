//! How far along a route a unit gets this turn

use std::collections::VecDeque;

use tracing::trace;

use crate::battle::board::GameBoard;
use crate::battle::hex::HexCoord;
use crate::battle::units::Unit;
use crate::battle::visibility::{enemy_zoc, has_visible_unit, Viewer};

/// This turn's portion of a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    pub start: usize,
    /// One past the last hex reached this turn
    pub end: usize,
    /// Movement left after entering each hex in `start + 1..end`
    pub moves_left: VecDeque<u32>,
    /// First hex where an enemy zone of control stops the unit
    pub zoc_stop: Option<HexCoord>,
}

impl TurnPlan {
    /// Index of the hex the unit stops on
    pub fn stop_index(&self) -> usize {
        self.end.saturating_sub(1).max(self.start)
    }

    /// Does the plan leave the start hex?
    pub fn moves(&self) -> bool {
        self.end > self.start + 1
    }
}

/// Plot how far `unit` gets along `route[start..stop]` this turn
///
/// Index 0 is the route's own start. Planning from any later index means
/// the unit is already part way along and may be pinned by a zone of
/// control where it stands. The plan never ends on a hex holding a unit
/// the mover's side can see; when the unit cannot leave the route's first
/// hex the plan is empty (`end == start`).
pub fn plot_turn(
    board: &GameBoard,
    unit: &Unit,
    route: &[HexCoord],
    start: usize,
    stop: usize,
) -> TurnPlan {
    let side = unit.side;
    let viewer = Viewer::Side(side);
    let stop = stop.min(route.len());
    let mut plan = TurnPlan {
        start,
        end: start,
        moves_left: VecDeque::new(),
        zoc_stop: None,
    };
    if start >= stop {
        return plan;
    }

    let mut remaining = i64::from(unit.movement_left);
    let mut end = start + 1;
    if start != 0 && !unit.skirmisher && enemy_zoc(board, side, route[start], viewer) {
        plan.zoc_stop = Some(route[start]);
    } else {
        while end < stop {
            let hex = route[end];
            let Some(cost) = board.map.terrain(hex).and_then(|t| unit.movement_cost(t)) else {
                break;
            };
            remaining -= i64::from(cost);
            if remaining < 0 {
                break;
            }
            plan.moves_left.push_back(remaining as u32);
            if plan.zoc_stop.is_none() && !unit.skirmisher && enemy_zoc(board, side, hex, viewer) {
                plan.zoc_stop = Some(hex);
                end += 1;
                break;
            }
            end += 1;
        }
    }

    // Never stop on top of a unit the mover can see
    let min_end = if start == 0 { start } else { start + 1 };
    while end > min_end && has_visible_unit(board, route[end - 1], side) {
        end -= 1;
    }
    plan.moves_left.truncate(end.saturating_sub(start + 1));
    plan.end = end;
    trace!(start, end, zoc_stop = ?plan.zoc_stop, "plotted turn");
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battle_map::BattleMap;
    use crate::battle::sides::Side;
    use crate::battle::terrain::Terrain;
    use crate::battle::unit_type::MovementType;
    use crate::core::types::SideId;

    fn board() -> GameBoard {
        let mut board = GameBoard::new(BattleMap::new(10, 10));
        board.add_side(Side::new(SideId(1), "north")).unwrap();
        board.add_side(Side::new(SideId(2), "south")).unwrap();
        board
    }

    fn straight(len: i32) -> Vec<HexCoord> {
        (0..len).map(|q| HexCoord::new(q, 0)).collect()
    }

    fn mover(board: &mut GameBoard, moves: u32) -> Unit {
        let unit = Unit::new("Walker", SideId(1), HexCoord::new(0, 0), MovementType::smallfoot(), moves);
        let id = board.add_unit(unit).unwrap();
        board.units.get(id).unwrap().clone()
    }

    #[test]
    fn test_stops_when_movement_runs_out() {
        let mut b = board();
        let unit = mover(&mut b, 3);
        let route = straight(6);
        let plan = plot_turn(&b, &unit, &route, 0, route.len());
        assert_eq!(plan.stop_index(), 3);
        assert_eq!(plan.moves_left, VecDeque::from([2, 1, 0]));
        assert!(plan.moves());
    }

    #[test]
    fn test_rough_terrain_costs_more() {
        let mut b = board();
        b.map.set_terrain(HexCoord::new(1, 0), Terrain::Hills);
        let unit = mover(&mut b, 3);
        let route = straight(6);
        let plan = plot_turn(&b, &unit, &route, 0, route.len());
        assert_eq!(plan.stop_index(), 2);
        assert_eq!(plan.moves_left, VecDeque::from([1, 0]));
    }

    #[test]
    fn test_zoc_ends_turn() {
        let mut b = board();
        let unit = mover(&mut b, 6);
        let guard = Unit::new("Guard", SideId(2), HexCoord::new(2, 1), MovementType::smallfoot(), 5);
        b.add_unit(guard).unwrap();
        let route = straight(6);
        let plan = plot_turn(&b, &unit, &route, 0, route.len());
        // (2,0) borders the guard at (2,1)
        assert_eq!(plan.zoc_stop, Some(HexCoord::new(2, 0)));
        assert_eq!(plan.stop_index(), 2);
    }

    #[test]
    fn test_pinned_mid_route() {
        let mut b = board();
        let unit = mover(&mut b, 6);
        let guard = Unit::new("Guard", SideId(2), HexCoord::new(2, 1), MovementType::smallfoot(), 5);
        b.add_unit(guard).unwrap();
        let route = straight(6);
        let plan = plot_turn(&b, &unit, &route, 2, route.len());
        assert_eq!(plan.end, 3);
        assert!(!plan.moves());
    }

    #[test]
    fn test_backs_off_occupied_stop() {
        let mut b = board();
        let unit = mover(&mut b, 3);
        let friend = Unit::new("Friend", SideId(1), HexCoord::new(3, 0), MovementType::smallfoot(), 5);
        b.add_unit(friend).unwrap();
        let route = straight(6);
        let plan = plot_turn(&b, &unit, &route, 0, route.len());
        assert_eq!(plan.stop_index(), 2);
        assert_eq!(plan.moves_left.len(), 2);
    }

    #[test]
    fn test_no_movement_gives_empty_plan() {
        let mut b = board();
        let unit = mover(&mut b, 0);
        let route = straight(3);
        let plan = plot_turn(&b, &unit, &route, 0, route.len());
        assert_eq!(plan.end, 0);
        assert!(plan.moves_left.is_empty());
    }
}
