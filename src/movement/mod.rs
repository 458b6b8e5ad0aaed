//! Route planning and move execution
//!
//! - `pathfinding`: A* route search and the turn-aware cost calculator
//! - `reachability`: movement, vision and jamming ranges
//! - `planner`: how much of a route fits in this turn
//! - `executor`: walking a unit along a route, with interruptions
//! - `undo` / `replay`: taking moves back and re-running recorded ones

pub mod executor;
pub mod pathfinding;
pub mod planner;
pub mod reachability;
pub mod replay;
pub mod spectator;
pub mod teleport;
pub mod undo;

pub use executor::{
    move_unit, Interruption, MoveExecutor, MoveFlags, MoveOptions, MoveOutcome, MoveRequest,
    SkipSighted,
};
pub use pathfinding::{
    heuristic, plan_route, CostCalculator, PlainRoute, RouteFinder, ShortestPathCalculator,
    UniformCost, NO_PATH_COST,
};
pub use planner::{plot_turn, TurnPlan};
pub use reachability::{
    jamming_range, move_range, vision_range, MoveRangeOptions, ReachQuery, Reachability,
    ReachabilityCalculator, ReachableTile,
};
pub use replay::{replay_all, replay_move, MoveCommand, MoveRecorder, RecordedMove, ReplayMismatch};
pub use spectator::{MoveSpectator, NoopSpectator, SpectatorLog};
pub use teleport::{TeleportGraph, TeleportLink, VisibilityMode};
pub use undo::{CapturedVillage, UndoMove, UndoStack};
