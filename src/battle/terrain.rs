//! Battle terrain types
//!
//! Terrain only names the ground; what it costs a unit to cross is decided by
//! the unit's movement type.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::TacticsError;

/// Primary terrain type for a battle hex
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Flat,
    Road,
    Hills,
    Mountains,
    Forest,
    ShallowWater,
    DeepWater,
    Village,
    Castle,
    Cave,
    Impassable,
}

impl Terrain {
    pub const ALL: [Terrain; 11] = [
        Terrain::Flat,
        Terrain::Road,
        Terrain::Hills,
        Terrain::Mountains,
        Terrain::Forest,
        Terrain::ShallowWater,
        Terrain::DeepWater,
        Terrain::Village,
        Terrain::Castle,
        Terrain::Cave,
        Terrain::Impassable,
    ];

    /// Can a side own this hex?
    pub fn is_village(&self) -> bool {
        matches!(self, Terrain::Village)
    }

    /// Can units with the in-cover concealment rule hide here?
    pub fn provides_concealment(&self) -> bool {
        matches!(self, Terrain::Forest | Terrain::Village | Terrain::Cave)
    }

    /// Snake-case name used in data files
    pub fn as_str(&self) -> &'static str {
        match self {
            Terrain::Flat => "flat",
            Terrain::Road => "road",
            Terrain::Hills => "hills",
            Terrain::Mountains => "mountains",
            Terrain::Forest => "forest",
            Terrain::ShallowWater => "shallow_water",
            Terrain::DeepWater => "deep_water",
            Terrain::Village => "village",
            Terrain::Castle => "castle",
            Terrain::Cave => "cave",
            Terrain::Impassable => "impassable",
        }
    }

    /// Single-character glyph used by text maps
    pub fn glyph(&self) -> char {
        match self {
            Terrain::Flat => '.',
            Terrain::Road => '=',
            Terrain::Hills => 'h',
            Terrain::Mountains => 'M',
            Terrain::Forest => 'f',
            Terrain::ShallowWater => '~',
            Terrain::DeepWater => 'W',
            Terrain::Village => 'v',
            Terrain::Castle => 'C',
            Terrain::Cave => 'u',
            Terrain::Impassable => 'X',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Terrain> {
        Terrain::ALL.into_iter().find(|t| t.glyph() == glyph)
    }
}

impl FromStr for Terrain {
    type Err = TacticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Terrain::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TacticsError::UnknownTerrain(s.to_string()))
    }
}
