//! Battle board model: hexes, terrain, units, sides and what each side can see
//!
//! Everything a move needs to know about the board lives on `GameBoard`,
//! which is passed explicitly to every planning and execution call.

pub mod battle_map;
pub mod board;
pub mod events;
pub mod hex;
pub mod scenario;
pub mod sides;
pub mod terrain;
pub mod unit_type;
pub mod units;
pub mod visibility;

// Re-exports for convenient access
pub use battle_map::BattleMap;
pub use board::{GameBoard, VillageCapture};
pub use events::{EventHandlers, EventPump, GameEvent, GameEventKind, NoEvents};
pub use hex::{HexCoord, HexDirection};
pub use scenario::{Scenario, ScenarioOrder};
pub use sides::Side;
pub use terrain::Terrain;
pub use unit_type::{load_movement_types, parse_movement_types, MovementType, TerrainCosts};
pub use units::{Concealment, GotoOrder, Unit, UnitRegistry};
pub use visibility::{
    build_jamming_map, enemy_zoc, get_visible_unit, has_visible_unit, is_invisible_to,
    recalculate_fog, ClearResult, JammingMap, ShroudClearer, SideVision, Viewer,
};
