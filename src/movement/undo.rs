//! Undo records for completed moves

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battle::board::GameBoard;
use crate::battle::hex::{HexCoord, HexDirection};
use crate::battle::units::GotoOrder;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{SideId, UnitId};

/// Everything needed to put a moved unit back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoMove {
    pub unit: UnitId,
    pub side: SideId,
    /// Hexes actually travelled, start first
    pub route: Vec<HexCoord>,
    pub original_moves: u32,
    pub original_facing: HexDirection,
    pub original_goto: Option<GotoOrder>,
    /// Owner of the final village before the move, if one was taken
    pub captured_village: Option<CapturedVillage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedVillage {
    pub previous_owner: Option<SideId>,
    pub time_bonus: bool,
}

impl UndoMove {
    pub fn first_hex(&self) -> Option<HexCoord> {
        self.route.first().copied()
    }

    pub fn last_hex(&self) -> Option<HexCoord> {
        self.route.last().copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: Vec<UndoMove>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_move(&mut self, entry: UndoMove) {
        self.entries.push(entry);
    }

    /// Forget everything; later moves cannot be undone past this point
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&UndoMove> {
        self.entries.last()
    }

    /// Reverse the most recent move
    ///
    /// Returns `Ok(None)` when there is nothing to undo. The unit must still
    /// exist and its starting hex must be free.
    pub fn undo(&mut self, board: &mut GameBoard) -> Result<Option<UndoMove>> {
        let Some(entry) = self.entries.pop() else {
            return Ok(None);
        };
        let (Some(from), Some(to)) = (entry.last_hex(), entry.first_hex()) else {
            return Ok(Some(entry));
        };
        let current = board
            .units
            .get(entry.unit)
            .map(|u| u.location())
            .ok_or(TacticsError::UnitNotFound(entry.unit))?;
        if current != from {
            self.entries.push(entry);
            return Err(TacticsError::InvalidRoute(format!(
                "unit is at {current}, expected {from}"
            )));
        }
        if let Err(e) = board.units.relocate(entry.unit, to) {
            self.entries.push(entry);
            return Err(e);
        }
        if let Some(unit) = board.units.get_mut(entry.unit) {
            unit.movement_left = entry.original_moves;
            unit.facing = entry.original_facing;
            unit.goto = entry.original_goto.clone();
            unit.interrupted_move = None;
        }

        if let Some(captured) = entry.captured_village {
            if let Some(side) = board.side_mut(entry.side) {
                side.lose_village(from);
                if captured.time_bonus {
                    side.action_bonus_count = side.action_bonus_count.saturating_sub(1);
                }
            }
            if let Some(owner) = captured.previous_owner.and_then(|s| board.side_mut(s)) {
                owner.gain_village(from);
            }
        }
        board.clear_status_caches();
        debug!(unit = ?entry.unit, from = %from, to = %to, "move undone");
        Ok(Some(entry))
    }
}
