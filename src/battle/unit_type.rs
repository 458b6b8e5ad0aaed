//! Movement types: what terrain costs a unit to cross, see through, or jam
//!
//! A movement type is the cost model for one family of units. Costs are
//! validated when the table is built: every reachable terrain costs at least
//! one point, so search code never has to guard against free or negative steps.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::battle::terrain::Terrain;
use crate::core::error::{Result, TacticsError};

/// Per-terrain cost table; terrain missing from the table is unreachable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerrainCosts {
    costs: BTreeMap<Terrain, u32>,
}

impl TerrainCosts {
    /// Build a table, rejecting any cost below 1
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Terrain, i64)>,
    {
        let mut costs = BTreeMap::new();
        for (terrain, cost) in entries {
            if cost < 1 {
                return Err(TacticsError::InvalidTerrainCost { terrain, cost });
            }
            costs.insert(terrain, cost as u32);
        }
        Ok(Self { costs })
    }

    /// Same cost on every terrain except `Impassable`
    pub fn uniform(cost: u32) -> Self {
        let costs = Terrain::ALL
            .into_iter()
            .filter(|t| *t != Terrain::Impassable)
            .map(|t| (t, cost.max(1)))
            .collect();
        Self { costs }
    }

    /// Cost to enter `terrain`, `None` when unreachable
    pub fn cost(&self, terrain: Terrain) -> Option<u32> {
        self.costs.get(&terrain).copied()
    }

    fn to_names(&self) -> BTreeMap<String, i64> {
        self.costs
            .iter()
            .map(|(t, c)| (t.as_str().to_string(), i64::from(*c)))
            .collect()
    }

    fn from_names(names: &BTreeMap<String, i64>) -> Result<Self> {
        let entries = names
            .iter()
            .map(|(name, cost)| Ok((name.parse::<Terrain>()?, *cost)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }
}

/// A named movement type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MovementTypeDef", into = "MovementTypeDef")]
pub struct MovementType {
    pub name: String,
    movement: TerrainCosts,
    vision: TerrainCosts,
    jamming: TerrainCosts,
    /// Defense percentage (chance to avoid a hit) per terrain
    defense: BTreeMap<Terrain, u8>,
}

impl MovementType {
    /// Create a movement type whose vision and jamming costs mirror movement
    pub fn new(name: impl Into<String>, movement: TerrainCosts) -> Self {
        Self {
            name: name.into(),
            vision: movement.clone(),
            jamming: movement.clone(),
            movement,
            defense: BTreeMap::new(),
        }
    }

    pub fn with_vision(mut self, vision: TerrainCosts) -> Self {
        self.vision = vision;
        self
    }

    pub fn with_jamming(mut self, jamming: TerrainCosts) -> Self {
        self.jamming = jamming;
        self
    }

    /// Set defense percentages, rejecting values above 100
    pub fn with_defense<I>(mut self, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Terrain, i64)>,
    {
        for (terrain, value) in entries {
            if !(0..=100).contains(&value) {
                return Err(TacticsError::InvalidDefense { terrain, value });
            }
            self.defense.insert(terrain, value as u8);
        }
        Ok(self)
    }

    /// Every passable terrain costs `cost`
    pub fn uniform(name: impl Into<String>, cost: u32) -> Self {
        Self::new(name, TerrainCosts::uniform(cost))
    }

    /// Standard foot soldiers
    pub fn smallfoot() -> Self {
        let costs = TerrainCosts {
            costs: BTreeMap::from([
                (Terrain::Flat, 1),
                (Terrain::Road, 1),
                (Terrain::Village, 1),
                (Terrain::Castle, 1),
                (Terrain::Hills, 2),
                (Terrain::Forest, 2),
                (Terrain::Cave, 2),
                (Terrain::Mountains, 3),
                (Terrain::ShallowWater, 3),
            ]),
        };
        Self::new("smallfoot", costs).with_defense_table([
            (Terrain::Flat, 40),
            (Terrain::Road, 40),
            (Terrain::Village, 60),
            (Terrain::Castle, 60),
            (Terrain::Hills, 50),
            (Terrain::Forest, 50),
            (Terrain::Cave, 40),
            (Terrain::Mountains, 60),
            (Terrain::ShallowWater, 20),
        ])
    }

    /// Horses: fast in the open, slow or stopped in rough ground
    pub fn mounted() -> Self {
        let costs = TerrainCosts {
            costs: BTreeMap::from([
                (Terrain::Flat, 1),
                (Terrain::Road, 1),
                (Terrain::Village, 1),
                (Terrain::Castle, 1),
                (Terrain::Hills, 2),
                (Terrain::Forest, 3),
                (Terrain::Cave, 4),
                (Terrain::ShallowWater, 4),
            ]),
        };
        Self::new("mounted", costs).with_defense_table([
            (Terrain::Flat, 40),
            (Terrain::Road, 40),
            (Terrain::Village, 40),
            (Terrain::Castle, 40),
            (Terrain::Hills, 40),
            (Terrain::Forest, 30),
            (Terrain::Cave, 20),
            (Terrain::ShallowWater, 20),
        ])
    }

    fn with_defense_table<const N: usize>(mut self, table: [(Terrain, u8); N]) -> Self {
        self.defense.extend(table);
        self
    }

    /// Movement cost to enter `terrain`; slowed units pay double
    pub fn movement_cost(&self, terrain: Terrain, slowed: bool) -> Option<u32> {
        self.movement
            .cost(terrain)
            .map(|c| if slowed { c * 2 } else { c })
    }

    /// Vision cost of looking across `terrain`
    pub fn vision_cost(&self, terrain: Terrain) -> Option<u32> {
        self.vision.cost(terrain)
    }

    /// Jamming cost of projecting interference across `terrain`
    pub fn jamming_cost(&self, terrain: Terrain) -> Option<u32> {
        self.jamming.cost(terrain)
    }

    /// Defense percentage on `terrain` (0-100)
    pub fn defense(&self, terrain: Terrain) -> u8 {
        self.defense.get(&terrain).copied().unwrap_or(0)
    }

    /// Chance to be hit on `terrain` (the inverse of defense)
    pub fn hit_chance(&self, terrain: Terrain) -> u8 {
        100 - self.defense(terrain)
    }
}

/// On-disk shape of a movement type (terrain keyed by name)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MovementTypeDef {
    name: String,
    movement_costs: BTreeMap<String, i64>,
    #[serde(default)]
    vision_costs: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    jamming_costs: Option<BTreeMap<String, i64>>,
    #[serde(default)]
    defense: BTreeMap<String, i64>,
}

impl TryFrom<MovementTypeDef> for MovementType {
    type Error = TacticsError;

    fn try_from(def: MovementTypeDef) -> Result<Self> {
        let movement = TerrainCosts::from_names(&def.movement_costs)?;
        let mut movetype = MovementType::new(def.name, movement);
        if let Some(vision) = &def.vision_costs {
            movetype.vision = TerrainCosts::from_names(vision)?;
        }
        if let Some(jamming) = &def.jamming_costs {
            movetype.jamming = TerrainCosts::from_names(jamming)?;
        }
        let defense = def
            .defense
            .iter()
            .map(|(name, value)| Ok((name.parse::<Terrain>()?, *value)))
            .collect::<Result<Vec<_>>>()?;
        movetype.with_defense(defense)
    }
}

impl From<MovementType> for MovementTypeDef {
    fn from(movetype: MovementType) -> Self {
        Self {
            name: movetype.name,
            movement_costs: movetype.movement.to_names(),
            vision_costs: Some(movetype.vision.to_names()),
            jamming_costs: Some(movetype.jamming.to_names()),
            defense: movetype
                .defense
                .iter()
                .map(|(t, d)| (t.as_str().to_string(), i64::from(*d)))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct MovementTypeFile {
    #[serde(default)]
    movetype: Vec<MovementType>,
}

/// Parse `[[movetype]]` tables from TOML text, keyed by name
pub fn parse_movement_types(content: &str) -> Result<BTreeMap<String, MovementType>> {
    let file: MovementTypeFile = toml::from_str(content)?;
    Ok(file
        .movetype
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect())
}

/// Load movement types from a TOML file
pub fn load_movement_types(path: &Path) -> Result<BTreeMap<String, MovementType>> {
    let content = std::fs::read_to_string(path)?;
    parse_movement_types(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_cost_is_rejected() {
        let result = TerrainCosts::new([(Terrain::Flat, 1), (Terrain::Road, 0)]);
        assert!(matches!(
            result,
            Err(TacticsError::InvalidTerrainCost {
                terrain: Terrain::Road,
                cost: 0
            })
        ));
    }

    #[test]
    fn test_missing_terrain_is_unreachable() {
        let smallfoot = MovementType::smallfoot();
        assert_eq!(smallfoot.movement_cost(Terrain::DeepWater, false), None);
        assert_eq!(smallfoot.movement_cost(Terrain::Hills, false), Some(2));
    }

    #[test]
    fn test_slowed_doubles_cost() {
        let smallfoot = MovementType::smallfoot();
        assert_eq!(smallfoot.movement_cost(Terrain::Forest, true), Some(4));
    }

    #[test]
    fn test_uniform_skips_impassable() {
        let uniform = MovementType::uniform("test", 1);
        assert_eq!(uniform.movement_cost(Terrain::Mountains, false), Some(1));
        assert_eq!(uniform.movement_cost(Terrain::Impassable, false), None);
    }

    #[test]
    fn test_defense_and_hit_chance() {
        let smallfoot = MovementType::smallfoot();
        assert_eq!(smallfoot.defense(Terrain::Village), 60);
        assert_eq!(smallfoot.hit_chance(Terrain::Village), 40);
        assert!(MovementType::uniform("x", 1)
            .with_defense([(Terrain::Flat, 101)])
            .is_err());
    }

    #[test]
    fn test_parse_movement_types() {
        let content = r#"
            [[movetype]]
            name = "treefolk"
            movement_costs = { flat = 1, forest = 1, hills = 2 }
            vision_costs = { flat = 1, forest = 1, hills = 1 }
            defense = { forest = 40 }
        "#;
        let types = parse_movement_types(content).unwrap();
        let treefolk = &types["treefolk"];
        assert_eq!(treefolk.movement_cost(Terrain::Forest, false), Some(1));
        assert_eq!(treefolk.vision_cost(Terrain::Hills), Some(1));
        assert_eq!(treefolk.jamming_cost(Terrain::Hills), Some(2));
        assert_eq!(treefolk.defense(Terrain::Forest), 40);
    }

    #[test]
    fn test_parse_rejects_negative_cost() {
        let content = r#"
            [[movetype]]
            name = "broken"
            movement_costs = { flat = -1 }
        "#;
        assert!(parse_movement_types(content).is_err());
    }
}
