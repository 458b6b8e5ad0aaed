use thiserror::Error;

use crate::battle::hex::HexCoord;
use crate::battle::terrain::Terrain;
use crate::core::types::{SideId, UnitId};

#[derive(Error, Debug)]
pub enum TacticsError {
    #[error("Unit not found: {0:?}")]
    UnitNotFound(UnitId),

    #[error("Invalid movement cost {cost} for terrain {terrain:?} (must be at least 1)")]
    InvalidTerrainCost { terrain: Terrain, cost: i64 },

    #[error("Invalid defense value {value} for terrain {terrain:?} (must be 0-100)")]
    InvalidDefense { terrain: Terrain, value: i64 },

    #[error("Hex already occupied: {0}")]
    OccupiedHex(HexCoord),

    #[error("No unit at {0}")]
    NoUnitAt(HexCoord),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Hex is off the board: {0}")]
    OffBoard(HexCoord),

    #[error("Unknown side: {0}")]
    UnknownSide(SideId),

    #[error("Unknown terrain: {0}")]
    UnknownTerrain(String),

    #[error("Unknown movement type: {0}")]
    UnknownMovementType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TacticsError>;
