//! Executing a planned move one hex at a time
//!
//! A move is plotted for this turn, pre-scanned for hidden enemies and
//! blockers, then walked step by step. Script events fire on every step and
//! may change anything on the board, so the executor holds only the mover's
//! id and route indices, and looks everything else up again after each
//! callback that ran.
//!
//! Stopping short is normal: ambushes, zones of control, sightings and
//! scripts all end moves early and are reported as outcome flags.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::battle::board::GameBoard;
use crate::battle::events::{EventPump, GameEvent, GameEventKind};
use crate::battle::hex::{HexCoord, HexDirection};
use crate::battle::units::GotoOrder;
use crate::battle::visibility::{is_invisible_to, ShroudClearer};
use crate::core::error::{Result, TacticsError};
use crate::core::types::{SideId, UnitId};
use crate::movement::planner::plot_turn;
use crate::movement::replay::{MoveCommand, MoveRecorder, ReplayMismatch};
use crate::movement::spectator::{MoveSpectator, NoopSpectator};
use crate::movement::teleport::{TeleportGraph, VisibilityMode};
use crate::movement::undo::{CapturedVillage, UndoMove, UndoStack};

/// Which sightings may interrupt a move
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipSighted {
    /// Any newly seen unit interrupts
    #[default]
    None,
    /// Only newly seen enemies interrupt
    AlliesOnly,
    /// Sightings never interrupt
    All,
}

impl SkipSighted {
    pub fn skips_enemies(&self) -> bool {
        *self == SkipSighted::All
    }

    pub fn skips_allies(&self) -> bool {
        *self != SkipSighted::None
    }
}

/// Why a move ended before the end of this turn's plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    MoverLost,
    Ambushed,
    Blocked,
    TeleportFailed,
    ScriptEvent,
    Sighted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoveFlags {
    pub ambushed: bool,
    pub blocked: bool,
    pub teleport_failed: bool,
    /// New units came into view during the move
    pub sighted: bool,
    /// The move stopped because of a sighting
    pub sighted_stop: bool,
    pub event_mutated: bool,
    /// A script changed the board before the last step was taken
    pub event_mutated_mid_move: bool,
    pub fog_changed: bool,
}

#[derive(Debug, Clone, Default)]
struct MoveState {
    /// Route indices; hexes before `ambush_limit` may be entered
    expected_end: usize,
    ambush_limit: usize,
    obstructed: usize,
    real_end: usize,
    /// Index of the hex the mover actually stands on
    move_loc: usize,
    moves_left: VecDeque<u32>,
    zoc_stop: Option<HexCoord>,
    ambush_stop: Option<HexCoord>,
    blocked_loc: Option<HexCoord>,
    ambushers: Vec<HexCoord>,
    revealed: BTreeSet<HexCoord>,
    flags: MoveFlags,
    relocated_to: Option<HexCoord>,
    mover_lost: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MoveOptions {
    pub skip_sighted: SkipSighted,
    /// Moves ordered by an AI keep their own goto handling
    pub automated: bool,
}

/// What happened during a move
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveOutcome {
    pub unit: UnitId,
    /// Hexes entered along the route
    pub steps: usize,
    pub final_hex: HexCoord,
    pub interrupted: bool,
    pub cause: Option<Interruption>,
    pub flags: MoveFlags,
    pub zoc_stopped: bool,
    pub ambush_alert: Option<String>,
    pub seen_enemies: usize,
    pub seen_friends: usize,
    pub village_captured: bool,
    pub undo_blocked: bool,
    /// Order stored on the unit for the rest of the route
    pub goto: Option<GotoOrder>,
    pub undo: Option<UndoMove>,
    pub replay_mismatch: Option<ReplayMismatch>,
}

impl MoveOutcome {
    /// A move that never left its hex
    pub fn unmoved(unit: UnitId, at: HexCoord) -> Self {
        Self {
            unit,
            steps: 0,
            final_hex: at,
            interrupted: false,
            cause: None,
            flags: MoveFlags::default(),
            zoc_stopped: false,
            ambush_alert: None,
            seen_enemies: 0,
            seen_friends: 0,
            village_captured: false,
            undo_blocked: false,
            goto: None,
            undo: None,
            replay_mismatch: None,
        }
    }

    /// Player-facing messages about the move
    pub fn alerts(&self) -> Vec<String> {
        let mut alerts = Vec::new();
        if self.flags.ambushed {
            alerts.push(
                self.ambush_alert
                    .clone()
                    .unwrap_or_else(|| "Ambushed!".to_string()),
            );
        }
        if self.flags.teleport_failed {
            alerts.push("Failed teleport! Exit not empty".to_string());
        }
        if self.flags.blocked {
            alerts.push("Blocked by an enemy unit".to_string());
        }
        if self.flags.sighted {
            let msg = match (self.seen_enemies, self.seen_friends) {
                (0, 0) => None,
                (1, 0) => Some("Enemy unit sighted!".to_string()),
                (e, 0) => Some(format!("{e} enemy units sighted!")),
                (0, 1) => Some("Friendly unit sighted".to_string()),
                (0, f) => Some(format!("{f} friendly units sighted")),
                (e, f) => Some(format!("Units sighted! ({f} friendly, {e} enemy)")),
            };
            alerts.extend(msg);
        }
        alerts
    }
}

/// Drives one unit along one route
pub struct MoveExecutor<'a> {
    board: &'a mut GameBoard,
    events: &'a mut dyn EventPump,
    spectator: &'a mut dyn MoveSpectator,
    route: Vec<HexCoord>,
    mover: UnitId,
    orig_side: SideId,
    orig_moves: u32,
    orig_facing: HexDirection,
    orig_goto: Option<GotoOrder>,
    current_side: SideId,
    current_uses_fog: bool,
    skip_sighting: bool,
    skip_ally_sighting: bool,
    automated: bool,
    clearer: ShroudClearer,
    state: MoveState,
    ambush_alert: Option<String>,
    seen_enemies: usize,
    seen_friends: usize,
    captured: Option<CapturedVillage>,
    undo_record: Option<UndoMove>,
}

impl<'a> MoveExecutor<'a> {
    /// Take control of the unit standing on `route[0]`
    ///
    /// The unit's goto order is cleared for the duration of the move.
    pub fn new(
        board: &'a mut GameBoard,
        events: &'a mut dyn EventPump,
        spectator: &'a mut dyn MoveSpectator,
        route: Vec<HexCoord>,
        options: MoveOptions,
    ) -> Result<Self> {
        let start = *route
            .first()
            .ok_or_else(|| TacticsError::InvalidRoute("empty route".to_string()))?;
        let mover = board.units.find(start).ok_or(TacticsError::NoUnitAt(start))?;
        let unit = board
            .units
            .get_mut(mover)
            .ok_or(TacticsError::UnitNotFound(mover))?;
        let orig_goto = unit.goto.take();
        let (orig_side, orig_moves, orig_facing) = (unit.side, unit.movement_left, unit.facing);

        let side = board
            .side(orig_side)
            .ok_or(TacticsError::UnknownSide(orig_side))?;
        let current_uses_fog = side.fog_or_shroud() && side.auto_shroud_updates;
        let skip_ally_sighting =
            options.skip_sighted.skips_allies() || !board.config.ally_sighted_interrupts;
        spectator.set_unit(mover);

        Ok(Self {
            board,
            events,
            spectator,
            route,
            mover,
            orig_side,
            orig_moves,
            orig_facing,
            orig_goto,
            current_side: orig_side,
            current_uses_fog,
            skip_sighting: options.skip_sighted.skips_enemies(),
            skip_ally_sighting,
            automated: options.automated,
            clearer: ShroudClearer::new(),
            state: MoveState::default(),
            ambush_alert: None,
            seen_enemies: 0,
            seen_friends: 0,
            captured: None,
            undo_record: None,
        })
    }

    pub fn mover(&self) -> UnitId {
        self.mover
    }

    /// Route indices the unit expects to cover this turn
    pub fn expected_end(&self) -> usize {
        self.state.expected_end
    }

    pub fn steps_travelled(&self) -> usize {
        self.state.move_loc
    }

    pub fn final_hex(&self) -> HexCoord {
        self.state
            .relocated_to
            .unwrap_or(self.route[self.state.move_loc])
    }

    /// Did something other than running out of movement end the move?
    pub fn interrupted(&self, include_end_events: bool) -> bool {
        let flags = &self.state.flags;
        let scripted = if include_end_events {
            flags.event_mutated
        } else {
            flags.event_mutated_mid_move
        };
        self.state.mover_lost
            || flags.ambushed
            || flags.blocked
            || flags.sighted
            || flags.teleport_failed
            || scripted
    }

    fn undo_blocked(&self) -> bool {
        let flags = &self.state.flags;
        flags.ambushed
            || flags.blocked
            || flags.event_mutated
            || flags.fog_changed
            || flags.teleport_failed
    }

    /// Plot this turn's part of the route; false when the unit cannot move
    pub fn check_expected_movement(&mut self) -> bool {
        let Some(unit) = self.board.units.get(self.mover) else {
            return false;
        };
        let plan = plot_turn(self.board, unit, &self.route, 0, self.route.len());
        self.state.expected_end = plan.end;
        self.state.moves_left = plan.moves_left;
        self.state.zoc_stop = plan.zoc_stop;
        plan.end != 0
    }

    /// Walk the plotted route
    pub fn try_actual_movement(&mut self) {
        self.cache_hidden_units(0, self.state.expected_end);

        let mut obstructed_stop = false;
        if self.state.ambush_limit != 0 {
            let mut real_end = 1;
            while real_end < self.state.ambush_limit {
                let step_from = real_end - 1;
                if self.state.flags.event_mutated {
                    break;
                }
                if self.state.flags.sighted && self.is_reasonable_stop(self.route[step_from]) {
                    self.state.flags.sighted_stop = true;
                    break;
                }
                if self.fire_hex_event(GameEventKind::ExitHex, step_from, real_end) {
                    break;
                }
                if real_end == self.state.obstructed {
                    obstructed_stop = true;
                    break;
                }

                self.do_move(step_from, real_end);
                if self.current_uses_fog {
                    self.handle_fog(self.route[real_end]);
                }

                if self.fire_hex_event(GameEventKind::EnterHex, real_end, step_from) {
                    real_end += 1;
                    break;
                }
                if self.state.flags.sighted
                    && self.is_reasonable_stop(self.route[real_end])
                    && self.pump_sighted(real_end)
                {
                    real_end += 1;
                    break;
                }
                real_end += 1;
            }
            self.state.real_end = real_end;
        }

        let flags = &mut self.state.flags;
        flags.ambushed = flags.ambushed && self.state.real_end == self.state.ambush_limit;
        if !obstructed_stop {
            self.state.blocked_loc = None;
        }
        flags.blocked = self.state.blocked_loc.is_some();
        flags.teleport_failed = flags.teleport_failed && obstructed_stop;
        flags.event_mutated_mid_move = flags.event_mutated;
    }

    /// Reveal ambushers, capture villages, fire `moveto` and record undo
    pub fn post_move(&mut self, undo: Option<&mut UndoStack>) {
        let end_of_route = self.route.len();
        if self.state.flags.ambushed || self.state.flags.blocked {
            self.reveal_ambushers();
        } else if self.state.flags.teleport_failed {
            let occupant = self
                .route
                .get(self.state.obstructed)
                .and_then(|&hex| self.board.units.find(hex));
            if let Some(id) = occupant {
                self.spectator.set_failed_teleport(id);
            }
        }
        self.board.clear_status_caches();

        let final_hex = self.final_hex();
        if self.board.units.contains(self.mover) {
            let stop_moving =
                self.state.flags.ambushed || self.state.zoc_stop == Some(final_hex);
            let interrupted_move = if self.state.flags.sighted_stop {
                self.route.last().copied()
            } else {
                None
            };
            if let Some(unit) = self.board.units.get_mut(self.mover) {
                unit.interrupted_move = interrupted_move;
                if stop_moving {
                    unit.movement_left = 0;
                }
            }

            let owned = self
                .board
                .side(self.current_side)
                .map_or(false, |s| s.owns_village(final_hex));
            if self.board.map.is_village(final_hex) && !owned {
                if let Some(unit) = self.board.units.get_mut(self.mover) {
                    unit.movement_left = 0;
                }
                let before = self.events.tracking();
                let capture = self.board.capture_village(
                    &mut *self.events,
                    final_hex,
                    self.current_side,
                    Some(self.mover),
                );
                self.captured = Some(CapturedVillage {
                    previous_owner: capture.previous_owner,
                    time_bonus: capture.time_bonus,
                });
                if capture.mutated {
                    self.state.flags.event_mutated = true;
                }
                if capture.mutated || self.events.tracking() != before {
                    self.post_wml(end_of_route);
                }
            }
        }

        if self.clearer.has_pending() {
            self.pump_sighted(end_of_route);
        }

        if self.board.units.contains(self.mover) {
            let event = GameEvent::new(GameEventKind::MoveTo, Some(self.mover), self.final_hex())
                .with_secondary(self.route[0]);
            let before = self.events.tracking();
            let mutated = self.events.fire(&mut *self.board, &event);
            if mutated {
                self.state.flags.event_mutated = true;
            }
            if mutated || self.events.tracking() != before {
                self.post_wml(end_of_route);
            }
        }

        let record = if self.board.units.contains(self.mover) {
            Some(UndoMove {
                unit: self.mover,
                side: self.orig_side,
                route: self.route[..=self.state.move_loc].to_vec(),
                original_moves: self.orig_moves,
                original_facing: self.orig_facing,
                original_goto: self.orig_goto.clone(),
                captured_village: self.captured,
            })
        } else {
            None
        };
        let blocked = self.undo_blocked();
        if let Some(stack) = undo {
            if let Some(entry) = &record {
                stack.add_move(entry.clone());
            }
            if record.is_none() || blocked {
                stack.clear();
            }
        }
        self.undo_record = if blocked { None } else { record };

        info!(
            unit = ?self.mover,
            steps = self.state.move_loc,
            to = %self.final_hex(),
            interrupted = self.interrupted(true),
            "move finished"
        );
    }

    /// Store the goto order and report
    pub fn finish(self) -> MoveOutcome {
        let final_hex = self.final_hex();
        let interrupted = self.interrupted(true);
        let mut goto = None;
        if !self.state.mover_lost && self.state.real_end != self.route.len() && !self.interrupted(false)
        {
            goto = if self.automated {
                self.orig_goto.clone()
            } else {
                GotoOrder::new(self.route[self.state.move_loc..].to_vec())
            };
            if let Some(unit) = self.board.units.get_mut(self.mover) {
                if unit.goto.is_none() {
                    unit.goto = goto.clone();
                }
            }
        }

        let cause = self.cause();
        let undo_blocked = self.undo_blocked();
        MoveOutcome {
            unit: self.mover,
            steps: self.state.move_loc,
            final_hex,
            interrupted,
            cause,
            flags: self.state.flags,
            zoc_stopped: self.state.zoc_stop == Some(final_hex),
            ambush_alert: self.ambush_alert,
            seen_enemies: self.seen_enemies,
            seen_friends: self.seen_friends,
            village_captured: self.captured.is_some(),
            undo_blocked,
            goto,
            undo: self.undo_record,
            replay_mismatch: None,
        }
    }

    fn cause(&self) -> Option<Interruption> {
        let flags = &self.state.flags;
        if self.state.mover_lost {
            Some(Interruption::MoverLost)
        } else if flags.ambushed {
            Some(Interruption::Ambushed)
        } else if flags.blocked {
            Some(Interruption::Blocked)
        } else if flags.teleport_failed {
            Some(Interruption::TeleportFailed)
        } else if flags.event_mutated {
            Some(Interruption::ScriptEvent)
        } else if flags.sighted {
            Some(Interruption::Sighted)
        } else {
            None
        }
    }

    /// Pre-scan `route[start..stop]` for hidden enemies and blockers
    ///
    /// Sets `ambush_limit`: hexes before it may be entered.
    fn cache_hidden_units(&mut self, start: usize, stop: usize) {
        self.state.obstructed = self.route.len();
        self.state.blocked_loc = None;
        self.state.flags.teleport_failed = false;

        self.state.flags.ambushed = self.state.flags.ambushed
            && self.state.ambush_stop == self.route.get(start).copied();
        if self.state.flags.ambushed {
            let board = &*self.board;
            let side = self.current_side;
            self.state.ambushers.retain(|&loc| {
                board
                    .units
                    .unit_at(loc)
                    .map_or(false, |u| board.is_enemy(side, u.side))
            });
            self.state.flags.ambushed = !self.state.ambushers.is_empty();
        }
        if !self.state.flags.ambushed {
            self.state.ambush_stop = None;
            self.state.ambushers.clear();
        }

        if start >= stop {
            self.state.ambush_limit = start;
            return;
        }
        let mut limit = start + 1;
        if !self.state.flags.ambushed {
            while limit < stop {
                let (prev, hex) = (self.route[limit - 1], self.route[limit]);
                if self.check_for_obstructing_unit(hex, prev) {
                    self.state.obstructed = limit;
                    limit += 1;
                    break;
                }
                if self.check_for_ambushers(hex) {
                    // Halt one hex before the ambush
                    self.state.ambush_stop = Some(prev);
                    break;
                }
                limit += 1;
            }
        }
        self.state.ambush_limit = limit;
    }

    /// Record hidden enemies next to `hex`
    fn check_for_ambushers(&mut self, hex: HexCoord) -> bool {
        let side = self.current_side;
        let mut found = false;
        for adj in hex.neighbors() {
            let Some(unit) = self.board.units.unit_at(adj) else {
                continue;
            };
            if unit.id == self.mover
                || !self.board.is_enemy(side, unit.side)
                || !is_invisible_to(self.board, unit, side)
            {
                continue;
            }
            if !self.state.ambushers.contains(&adj) {
                self.state.ambushers.push(adj);
            }
            found = true;
        }
        if found {
            self.state.flags.ambushed = true;
        }
        found
    }

    /// Is `hex`, reached from `prev`, occupied in a way that stops the move?
    fn check_for_obstructing_unit(&mut self, hex: HexCoord, prev: HexCoord) -> bool {
        let Some(blocker) = self.board.units.unit_at(hex) else {
            return false;
        };
        if blocker.id == self.mover {
            return false;
        }
        let enemy = self.board.is_enemy(self.current_side, blocker.side);
        if !hex.is_adjacent(&prev) {
            if !enemy && self.passes_allied_units(prev, hex) {
                return false;
            }
            self.state.flags.teleport_failed = true;
            return true;
        }
        if enemy {
            self.state.blocked_loc = Some(hex);
            return true;
        }
        false
    }

    fn passes_allied_units(&self, from: HexCoord, to: HexCoord) -> bool {
        self.board.units.get(self.mover).map_or(false, |unit| {
            TeleportGraph::build(self.board, unit, VisibilityMode::SeeAll, true, false)
                .passes_allied_units(from, to)
        })
    }

    /// A sighting may stop the unit here: it stands on `hex` and is not
    /// about to leave a village it has not taken
    fn is_reasonable_stop(&self, hex: HexCoord) -> bool {
        if self.route[self.state.move_loc] != hex {
            return false;
        }
        !self.board.map.is_village(hex)
            || self
                .board
                .side(self.current_side)
                .map_or(false, |s| s.owns_village(hex))
    }

    /// Relocate the mover one step; fails quietly onto occupied hexes
    fn do_move(&mut self, step_from: usize, step_to: usize) {
        let moves = self.state.moves_left.pop_front();
        let from = self.route[self.state.move_loc];
        let to = self.route[step_to];
        let Some(unit) = self.board.units.get_mut(self.mover) else {
            return;
        };
        if let Some(moves) = moves {
            unit.movement_left = moves;
        }
        if self.board.units.move_unit(from, to).is_none() {
            debug!(from = %from, to = %to, "passing through an occupied hex");
            return;
        }
        if let Some(unit) = self.board.units.get_mut(self.mover) {
            unit.facing = self.route[step_from].direction_to(&to);
        }
        self.state.move_loc = step_to;
    }

    fn handle_fog(&mut self, hex: HexCoord) {
        let result = self
            .clearer
            .clear_unit(&mut *self.board, self.mover, hex, &mut *self.spectator);
        if result.cleared {
            self.state.flags.fog_changed = true;
        }
        self.seen_enemies += result.enemies;
        self.seen_friends += result.friends;
        if !self.skip_sighting {
            self.state.flags.sighted = self.seen_enemies != 0;
        }
        if !self.skip_ally_sighting {
            self.state.flags.sighted |= self.seen_friends != 0;
        }
    }

    /// Fire an enter/exit event; returns whether the move must stop
    fn fire_hex_event(&mut self, kind: GameEventKind, current: usize, other: usize) -> bool {
        let event = GameEvent::new(kind, Some(self.mover), self.route[current])
            .with_secondary(self.route[other]);
        let before = self.events.tracking();
        let mutated = self.events.fire(&mut *self.board, &event);
        if mutated {
            self.state.flags.event_mutated = true;
        }
        if mutated || self.events.tracking() != before {
            return self.post_wml(current);
        }
        false
    }

    /// Fire deferred `sighted` events; returns whether the move must stop
    fn pump_sighted(&mut self, from: usize) -> bool {
        let before = self.events.tracking();
        let mutated = self
            .clearer
            .fire_events(&mut *self.board, &mut *self.events);
        if mutated {
            self.state.flags.event_mutated = true;
        }
        if mutated || self.events.tracking() != before {
            return self.post_wml(from);
        }
        false
    }

    /// Catch up with whatever scripts did to the board
    ///
    /// Re-resolves the mover by id and, if it is still where the route says,
    /// re-plots the rest of the turn from `step`.
    fn post_wml(&mut self, step: usize) -> bool {
        self.board.clear_status_caches();

        let expected_at = self.route[self.state.move_loc];
        match self.board.units.get(self.mover) {
            None => {
                warn!(unit = ?self.mover, "moving unit disappeared during a script event");
                self.state.mover_lost = true;
            }
            Some(unit) => {
                if unit.location() != expected_at && self.state.relocated_to.is_none() {
                    debug!(
                        unit = ?self.mover,
                        expected = %expected_at,
                        actual = %unit.location(),
                        "moving unit relocated by a script event"
                    );
                    self.state.relocated_to = Some(unit.location());
                    self.state.flags.event_mutated = true;
                }
                self.current_side = unit.side;
            }
        }
        self.current_uses_fog = self.board.side(self.current_side).map_or(false, |s| {
            s.fog_or_shroud() && (self.current_side != self.orig_side || s.auto_shroud_updates)
        });

        if !self.state.mover_lost && self.state.relocated_to.is_none() && step < self.route.len()
        {
            if let Some(unit) = self.board.units.get(self.mover) {
                let plan = plot_turn(self.board, unit, &self.route, step, self.state.expected_end);
                self.state.moves_left = plan.moves_left;
                self.state.zoc_stop = plan.zoc_stop;
                let end = plan.end;
                self.cache_hidden_units(step, end);
                if self.state.ambush_limit <= step {
                    self.state.ambush_limit = step + 1;
                }
            }
        }

        self.state.flags.event_mutated || self.state.mover_lost || self.state.relocated_to.is_some()
    }

    fn reveal_ambushers(&mut self) {
        if let Some(loc) = self.state.blocked_loc {
            self.reveal_ambusher(loc, false);
        }
        for loc in self.state.ambushers.clone() {
            self.reveal_ambusher(loc, true);
        }
        if self.clearer.has_pending() {
            self.pump_sighted(self.route.len());
        }
    }

    /// Uncover one hidden unit; repeated calls for the same hex do nothing
    fn reveal_ambusher(&mut self, hex: HexCoord, update_alert: bool) {
        if !self.state.revealed.insert(hex) {
            return;
        }
        let Some(unit) = self.board.units.unit_at(hex) else {
            return;
        };
        let (id, alert) = (unit.id, unit.ambush_alert.clone());
        if let Some(unit) = self.board.units.get_mut(id) {
            unit.uncovered = true;
        }
        self.spectator.set_ambusher(id);
        if update_alert && self.ambush_alert.is_none() {
            self.ambush_alert = Some(alert.unwrap_or_else(|| "Ambushed!".to_string()));
        }
        let event = GameEvent::new(GameEventKind::Sighted, Some(id), hex)
            .with_secondary(self.final_hex());
        self.clearer.queue_sighted(event);
        debug!(ambusher = ?id, at = %hex, "ambusher revealed");
    }
}

/// A request to move the unit standing on `route[0]`
pub struct MoveRequest<'r> {
    pub route: Vec<HexCoord>,
    pub skip_sighted: SkipSighted,
    pub automated: bool,
    pub spectator: Option<&'r mut dyn MoveSpectator>,
    pub undo: Option<&'r mut UndoStack>,
    pub recorder: Option<&'r mut MoveRecorder>,
    /// Final hex recorded for this move, when replaying
    pub replay_dest: Option<HexCoord>,
}

impl<'r> MoveRequest<'r> {
    pub fn new(route: Vec<HexCoord>) -> Self {
        Self {
            route,
            skip_sighted: SkipSighted::None,
            automated: false,
            spectator: None,
            undo: None,
            recorder: None,
            replay_dest: None,
        }
    }

    pub fn skip_sighted(mut self, skip: SkipSighted) -> Self {
        self.skip_sighted = skip;
        self
    }

    pub fn automated(mut self) -> Self {
        self.automated = true;
        self
    }

    pub fn with_spectator(mut self, spectator: &'r mut dyn MoveSpectator) -> Self {
        self.spectator = Some(spectator);
        self
    }

    pub fn with_undo(mut self, undo: &'r mut UndoStack) -> Self {
        self.undo = Some(undo);
        self
    }

    pub fn with_recorder(mut self, recorder: &'r mut MoveRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn expecting(mut self, dest: HexCoord) -> Self {
        self.replay_dest = Some(dest);
        self
    }
}

/// Move a unit along a planned route
///
/// Stopping early is not an error; it is reported in the outcome. Errors
/// mean the request itself was unusable (empty route, no unit at its start).
pub fn move_unit(
    board: &mut GameBoard,
    events: &mut dyn EventPump,
    request: MoveRequest<'_>,
) -> Result<MoveOutcome> {
    let MoveRequest {
        route,
        skip_sighted,
        automated,
        spectator,
        undo,
        recorder,
        replay_dest,
    } = request;

    let start = *route
        .first()
        .ok_or_else(|| TacticsError::InvalidRoute("empty route".to_string()))?;
    let unit = board.units.unit_at(start).ok_or(TacticsError::NoUnitAt(start))?;
    let unit_id = unit.id;
    if route.len() < 2 || (route.len() == 2 && route[0] == route[1]) {
        debug!(at = %start, "route has no steps");
        return Ok(MoveOutcome::unmoved(unit_id, start));
    }
    let uses_fog = board
        .side(unit.side)
        .ok_or(TacticsError::UnknownSide(unit.side))?
        .fog_or_shroud();
    let effective_skip = if uses_fog {
        skip_sighted
    } else {
        SkipSighted::All
    };

    let mut noop = NoopSpectator;
    let spectator: &mut dyn MoveSpectator = match spectator {
        Some(s) => s,
        None => &mut noop,
    };
    let options = MoveOptions {
        skip_sighted: effective_skip,
        automated,
    };
    let mut executor = MoveExecutor::new(board, events, spectator, route.clone(), options)?;

    if !executor.check_expected_movement() {
        let mut outcome = executor.finish();
        if let Some(expected) = replay_dest {
            warn!(at = %start, "corrupt movement in replay: unit cannot move");
            outcome.replay_mismatch = Some(ReplayMismatch::NoMovement {
                expected,
                at: start,
            });
        }
        return Ok(outcome);
    }

    let recorded = recorder.map(|rec| {
        let index = rec.record(MoveCommand {
            route,
            skip_sighted,
        });
        (rec, index)
    });

    executor.try_actual_movement();
    executor.post_move(undo);
    let mut outcome = executor.finish();

    if let Some((rec, index)) = recorded {
        rec.set_final_hex(index, outcome.final_hex);
    }
    if let Some(expected) = replay_dest {
        if expected != outcome.final_hex {
            warn!(
                expected = %expected,
                computed = %outcome.final_hex,
                "replay mismatch: unit stopped on a different hex"
            );
            outcome.replay_mismatch = Some(ReplayMismatch::Destination {
                expected,
                computed: outcome.final_hex,
            });
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::battle_map::BattleMap;
    use crate::battle::events::{EventHandlers, NoEvents};
    use crate::battle::sides::Side;
    use crate::battle::terrain::Terrain;
    use crate::battle::unit_type::MovementType;
    use crate::battle::units::{Concealment, Unit};
    use crate::movement::spectator::SpectatorLog;
    use crate::movement::teleport::TeleportLink;

    fn board() -> GameBoard {
        let mut board = GameBoard::new(BattleMap::new(12, 12));
        board.add_side(Side::new(SideId(1), "north")).unwrap();
        board.add_side(Side::new(SideId(2), "south")).unwrap();
        board
    }

    fn walker(side: u32, q: i32, r: i32, moves: u32) -> Unit {
        Unit::new("Walker", SideId(side), HexCoord::new(q, r), MovementType::uniform("flat", 1), moves)
    }

    fn straight(len: i32) -> Vec<HexCoord> {
        (0..len).map(|q| HexCoord::new(q, 0)).collect()
    }

    #[test]
    fn test_full_move_without_interruption() {
        let mut b = board();
        let id = b.add_unit(walker(1, 0, 0, 5)).unwrap();
        let mut undo = UndoStack::new();
        let outcome = move_unit(
            &mut b,
            &mut NoEvents,
            MoveRequest::new(straight(4)).with_undo(&mut undo),
        )
        .unwrap();
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.final_hex, HexCoord::new(3, 0));
        assert!(!outcome.interrupted);
        assert!(outcome.goto.is_none());
        assert_eq!(undo.len(), 1);
        let unit = b.units.get(id).unwrap();
        assert_eq!(unit.movement_left, 2);
        assert_eq!(unit.facing, HexDirection::East);
    }

    #[test]
    fn test_degenerate_routes_do_nothing() {
        let mut b = board();
        b.add_unit(walker(1, 0, 0, 5)).unwrap();
        let single = move_unit(&mut b, &mut NoEvents, MoveRequest::new(vec![HexCoord::new(0, 0)]));
        assert_eq!(single.unwrap().steps, 0);
        let onto_self = MoveRequest::new(vec![HexCoord::new(0, 0), HexCoord::new(0, 0)]);
        assert_eq!(move_unit(&mut b, &mut NoEvents, onto_self).unwrap().steps, 0);
        assert!(matches!(
            move_unit(&mut b, &mut NoEvents, MoveRequest::new(Vec::new())),
            Err(TacticsError::InvalidRoute(_))
        ));
        assert!(matches!(
            move_unit(&mut b, &mut NoEvents, MoveRequest::new(vec![HexCoord::new(5, 5), HexCoord::new(6, 5)])),
            Err(TacticsError::NoUnitAt(_))
        ));
    }

    #[test]
    fn test_visible_enemy_on_route_blocks() {
        let mut b = board();
        b.add_unit(walker(1, 0, 0, 10).with_skirmisher()).unwrap();
        let enemy = b.add_unit(walker(2, 3, 0, 5)).unwrap();
        let mut log = SpectatorLog::default();
        let outcome = move_unit(
            &mut b,
            &mut NoEvents,
            MoveRequest::new(straight(5)).with_spectator(&mut log),
        )
        .unwrap();
        assert_eq!(outcome.final_hex, HexCoord::new(2, 0));
        assert!(outcome.flags.blocked);
        assert_eq!(outcome.cause, Some(Interruption::Blocked));
        assert!(outcome.undo_blocked);
        assert_eq!(log.ambusher, Some(enemy));
    }

    #[test]
    fn test_teleport_exit_occupied_by_ally_fails() {
        let mut b = board();
        let (gate, exit) = (HexCoord::new(1, 0), HexCoord::new(8, 8));
        b.tunnels.push(TeleportLink::new("gate", [gate], [exit]));
        b.add_unit(walker(1, 0, 0, 10)).unwrap();
        let ally = b.add_unit(walker(1, 8, 8, 5)).unwrap();
        let mut log = SpectatorLog::default();
        let route = vec![HexCoord::new(0, 0), gate, exit, HexCoord::new(8, 9)];
        let outcome = move_unit(
            &mut b,
            &mut NoEvents,
            MoveRequest::new(route).with_spectator(&mut log),
        )
        .unwrap();
        assert_eq!(outcome.final_hex, gate);
        assert!(outcome.flags.teleport_failed);
        assert_eq!(log.failed_teleport, Some(ally));
        assert!(outcome
            .alerts()
            .iter()
            .any(|a| a.starts_with("Failed teleport")));
    }

    #[test]
    fn test_allied_pass_through_tunnel() {
        let mut b = board();
        let (gate, exit) = (HexCoord::new(1, 0), HexCoord::new(8, 8));
        b.tunnels
            .push(TeleportLink::new("gate", [gate], [exit]).with_pass_allied_units());
        b.add_unit(walker(1, 0, 0, 10)).unwrap();
        b.add_unit(walker(1, 8, 8, 5)).unwrap();
        let route = vec![HexCoord::new(0, 0), gate, exit, HexCoord::new(8, 9)];
        let outcome = move_unit(&mut b, &mut NoEvents, MoveRequest::new(route)).unwrap();
        assert!(!outcome.flags.teleport_failed);
        assert_eq!(outcome.final_hex, HexCoord::new(8, 9));
    }

    #[test]
    fn test_ambusher_revealed_once() {
        let mut b = board();
        b.add_unit(walker(1, 0, 0, 5)).unwrap();
        let hidden = HexCoord::new(2, 1);
        b.add_unit(walker(2, 2, 1, 5).with_concealment(Concealment::Always))
            .unwrap();

        let mut events = EventHandlers::new();
        let mut log = SpectatorLog::default();
        {
            let mut executor = MoveExecutor::new(
                &mut b,
                &mut events,
                &mut log,
                straight(4),
                MoveOptions::default(),
            )
            .unwrap();
            assert_eq!(executor.steps_travelled(), 0);
            executor.reveal_ambusher(hidden, true);
            executor.reveal_ambusher(hidden, true);
            executor.pump_sighted(4);
            assert_eq!(executor.ambush_alert.as_deref(), Some("Ambushed!"));
        }
        assert_eq!(events.count(GameEventKind::Sighted), 1);
        assert!(b.units.unit_at(hidden).unwrap().uncovered);
        assert!(log.ambusher.is_some());
    }

    #[test]
    fn test_custom_ambush_alert() {
        let mut b = board();
        b.add_unit(walker(1, 0, 0, 5)).unwrap();
        b.add_unit(
            walker(2, 2, 1, 5)
                .with_concealment(Concealment::Always)
                .with_ambush_alert("Wolves in the grass!"),
        )
        .unwrap();
        let outcome = move_unit(&mut b, &mut NoEvents, MoveRequest::new(straight(4))).unwrap();
        assert!(outcome.flags.ambushed);
        assert_eq!(outcome.final_hex, HexCoord::new(1, 0));
        assert_eq!(outcome.alerts(), vec!["Wolves in the grass!".to_string()]);
    }

    #[test]
    fn test_sighting_stops_fogged_move() {
        let mut b = GameBoard::new(BattleMap::new(12, 12));
        b.add_side(Side::new(SideId(1), "north").with_fog()).unwrap();
        b.add_side(Side::new(SideId(2), "south")).unwrap();
        let id = b.add_unit(walker(1, 0, 0, 6).with_vision(2)).unwrap();
        b.add_unit(walker(2, 6, 0, 5)).unwrap();
        b.start_turn(SideId(1)).unwrap();

        let outcome = move_unit(&mut b, &mut NoEvents, MoveRequest::new(straight(6))).unwrap();
        assert_eq!(outcome.final_hex, HexCoord::new(3, 0));
        assert!(outcome.flags.sighted_stop);
        assert_eq!(outcome.seen_enemies, 1);
        assert_eq!(outcome.cause, Some(Interruption::Sighted));
        assert!(outcome.undo_blocked);
        assert_eq!(
            b.units.get(id).unwrap().interrupted_move,
            Some(HexCoord::new(5, 0))
        );
        assert!(outcome.alerts().contains(&"Enemy unit sighted!".to_string()));
    }

    #[test]
    fn test_skip_sighted_keeps_moving() {
        let mut b = GameBoard::new(BattleMap::new(12, 12));
        b.add_side(Side::new(SideId(1), "north").with_fog()).unwrap();
        b.add_side(Side::new(SideId(2), "south")).unwrap();
        b.add_unit(walker(1, 0, 0, 6).with_vision(2)).unwrap();
        b.add_unit(walker(2, 6, 0, 5)).unwrap();
        b.start_turn(SideId(1)).unwrap();

        let request = MoveRequest::new(straight(6)).skip_sighted(SkipSighted::All);
        let outcome = move_unit(&mut b, &mut NoEvents, request).unwrap();
        assert_eq!(outcome.final_hex, HexCoord::new(5, 0));
        assert!(!outcome.flags.sighted);
        assert_eq!(outcome.seen_enemies, 1);
    }

    fn fogged_board_with_ally() -> GameBoard {
        let mut b = GameBoard::new(BattleMap::new(12, 12));
        b.add_side(Side::new(SideId(1), "north").with_fog()).unwrap();
        b.add_side(Side::new(SideId(3), "north")).unwrap();
        b.add_unit(walker(1, 0, 0, 6).with_vision(2)).unwrap();
        b.add_unit(walker(3, 6, 0, 5)).unwrap();
        b.start_turn(SideId(1)).unwrap();
        b
    }

    #[test]
    fn test_sighted_ally_stops_move() {
        let mut b = fogged_board_with_ally();
        let outcome = move_unit(&mut b, &mut NoEvents, MoveRequest::new(straight(6))).unwrap();
        assert_eq!(outcome.final_hex, HexCoord::new(3, 0));
        assert_eq!(outcome.seen_friends, 1);
        assert_eq!(outcome.seen_enemies, 0);
        assert_eq!(outcome.cause, Some(Interruption::Sighted));
        assert!(outcome.alerts().contains(&"Friendly unit sighted".to_string()));
    }

    #[test]
    fn test_allies_only_skip_ignores_friends() {
        let mut b = fogged_board_with_ally();
        let request = MoveRequest::new(straight(6)).skip_sighted(SkipSighted::AlliesOnly);
        let outcome = move_unit(&mut b, &mut NoEvents, request).unwrap();
        assert_eq!(outcome.final_hex, HexCoord::new(5, 0));
        assert_eq!(outcome.seen_friends, 1);
        assert!(!outcome.flags.sighted);
    }

    #[test]
    fn test_village_capture_ends_move() {
        let mut b = board();
        let village = HexCoord::new(2, 0);
        b.map.set_terrain(village, Terrain::Village);
        b.side_mut(SideId(2)).unwrap().gain_village(village);
        let id = b.add_unit(walker(1, 0, 0, 5)).unwrap();
        let mut events = EventHandlers::new();
        let outcome = move_unit(&mut b, &mut events, MoveRequest::new(straight(3))).unwrap();
        assert!(outcome.village_captured);
        assert_eq!(b.village_owner(village), Some(SideId(1)));
        assert_eq!(b.units.get(id).unwrap().movement_left, 0);
        assert_eq!(events.count(GameEventKind::Capture), 1);
        assert_eq!(events.count(GameEventKind::MoveTo), 1);
        let undo = outcome.undo.unwrap();
        assert_eq!(undo.captured_village.unwrap().previous_owner, Some(SideId(2)));
    }

    #[test]
    fn test_hex_events_carry_both_endpoints() {
        let mut b = board();
        b.add_unit(walker(1, 0, 0, 5)).unwrap();
        let mut events = EventHandlers::new();
        move_unit(&mut b, &mut events, MoveRequest::new(straight(3))).unwrap();
        let kinds: Vec<GameEventKind> = events.fired().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                GameEventKind::ExitHex,
                GameEventKind::EnterHex,
                GameEventKind::ExitHex,
                GameEventKind::EnterHex,
                GameEventKind::MoveTo,
            ]
        );
        let enter = &events.fired()[1];
        assert_eq!(enter.primary, HexCoord::new(1, 0));
        assert_eq!(enter.secondary, Some(HexCoord::new(0, 0)));
    }

    #[test]
    fn test_script_removing_mover_stops_move() {
        let mut b = board();
        b.add_unit(walker(1, 0, 0, 5)).unwrap();
        let mut events = EventHandlers::new();
        events.on(GameEventKind::EnterHex, |board, event| {
            if let Some(id) = event.unit {
                board.units.remove(id);
            }
            false
        });
        let outcome = move_unit(&mut b, &mut events, MoveRequest::new(straight(4))).unwrap();
        assert!(outcome.interrupted);
        assert_eq!(outcome.cause, Some(Interruption::MoverLost));
        assert_eq!(outcome.steps, 1);
        assert!(outcome.undo.is_none());
        assert_eq!(events.count(GameEventKind::MoveTo), 0);
    }

    #[test]
    fn test_automated_move_keeps_agent_goto() {
        let mut b = board();
        let order = GotoOrder::new(vec![HexCoord::new(9, 0)]).unwrap();
        let mut unit = walker(1, 0, 0, 2);
        unit.goto = Some(order.clone());
        let id = b.add_unit(unit).unwrap();
        let outcome = move_unit(
            &mut b,
            &mut NoEvents,
            MoveRequest::new(straight(6)).automated(),
        )
        .unwrap();
        assert_eq!(outcome.final_hex, HexCoord::new(2, 0));
        assert_eq!(b.units.get(id).unwrap().goto, Some(order));
    }

    #[test]
    fn test_alert_wording_for_mixed_sightings() {
        let mut outcome = MoveOutcome::unmoved(UnitId::new(), HexCoord::new(0, 0));
        outcome.flags.sighted = true;
        outcome.seen_enemies = 2;
        outcome.seen_friends = 1;
        assert_eq!(
            outcome.alerts(),
            vec!["Units sighted! (1 friendly, 2 enemy)".to_string()]
        );
    }
}
