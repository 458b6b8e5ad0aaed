//! TOML scenario files: a map, sides, units, tunnels and the moves to run
//!
//! ```toml
//! name = "ford"
//! map = ["....~~..", "..hh~~.."]
//!
//! [[side]]
//! id = 1
//! team = "north"
//! fog = true
//!
//! [[unit]]
//! name = "Spearman"
//! side = 1
//! at = { q = 0, r = 0 }
//! movetype = "smallfoot"
//! moves = 5
//!
//! [[order]]
//! from = { q = 0, r = 0 }
//! goal = { q = 6, r = 1 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::battle::battle_map::BattleMap;
use crate::battle::board::GameBoard;
use crate::battle::hex::HexCoord;
use crate::battle::sides::Side;
use crate::battle::unit_type::MovementType;
use crate::battle::units::{Concealment, Unit};
use crate::core::config::MovementConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::SideId;
use crate::movement::executor::SkipSighted;
use crate::movement::teleport::TeleportLink;

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    name: String,
    map: Vec<String>,
    #[serde(default)]
    config: Option<MovementConfig>,
    #[serde(default)]
    side: Vec<SideDef>,
    #[serde(default)]
    movetype: Vec<MovementType>,
    #[serde(default)]
    unit: Vec<UnitDef>,
    #[serde(default)]
    tunnel: Vec<TunnelDef>,
    #[serde(default)]
    order: Vec<ScenarioOrder>,
}

#[derive(Debug, Deserialize)]
struct SideDef {
    id: SideId,
    team: String,
    #[serde(default)]
    fog: bool,
    #[serde(default)]
    shroud: bool,
    #[serde(default)]
    villages: Vec<HexCoord>,
}

#[derive(Debug, Deserialize)]
struct UnitDef {
    name: String,
    side: SideId,
    at: HexCoord,
    movetype: String,
    moves: u32,
    movement_left: Option<u32>,
    vision: Option<u32>,
    #[serde(default)]
    jamming: u32,
    #[serde(default)]
    skirmisher: bool,
    concealment: Option<Concealment>,
    ambush_alert: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TunnelDef {
    #[serde(flatten)]
    link: TeleportLink,
    #[serde(default)]
    bidirectional: bool,
}

/// A move to plan and execute once the scenario is loaded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScenarioOrder {
    /// Hex of the unit to move
    pub from: HexCoord,
    pub goal: HexCoord,
    #[serde(default)]
    pub skip_sighted: SkipSighted,
}

/// A fully built board plus the orders to run on it
#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    pub board: GameBoard,
    pub orders: Vec<ScenarioOrder>,
}

fn builtin_movetypes() -> BTreeMap<String, MovementType> {
    [MovementType::smallfoot(), MovementType::mounted()]
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect()
}

impl Scenario {
    /// Parse and build a scenario from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ScenarioFile = toml::from_str(content)?;
        Self::build(file)
    }

    /// Load a scenario file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn build(file: ScenarioFile) -> Result<Self> {
        let map = BattleMap::from_rows(&file.map)?;
        let config = file.config.unwrap_or_default();
        config.validate()?;
        let mut board = GameBoard::new(map).with_config(config);

        for def in file.side {
            let mut side = Side::new(def.id, def.team);
            side.fog = def.fog;
            side.shroud = def.shroud;
            for village in def.villages {
                if !board.map.is_village(village) {
                    return Err(TacticsError::InvalidConfig(format!(
                        "side {} owns {village}, which is not a village",
                        def.id
                    )));
                }
                side.gain_village(village);
            }
            board.add_side(side)?;
        }

        let mut movetypes = builtin_movetypes();
        movetypes.extend(file.movetype.into_iter().map(|m| (m.name.clone(), m)));

        for def in file.unit {
            let movetype = movetypes
                .get(&def.movetype)
                .cloned()
                .ok_or_else(|| TacticsError::UnknownMovementType(def.movetype.clone()))?;
            let mut unit = Unit::new(def.name, def.side, def.at, movetype, def.moves)
                .with_jamming(def.jamming);
            if let Some(left) = def.movement_left {
                unit = unit.with_movement_left(left);
            }
            if let Some(vision) = def.vision {
                unit = unit.with_vision(vision);
            }
            if def.skirmisher {
                unit = unit.with_skirmisher();
            }
            if let Some(concealment) = def.concealment {
                unit = unit.with_concealment(concealment);
            }
            if let Some(alert) = def.ambush_alert {
                unit = unit.with_ambush_alert(alert);
            }
            board.add_unit(unit)?;
        }

        for def in file.tunnel {
            if def.bidirectional {
                let reverse = TeleportLink {
                    id: format!("{}#reverse", def.link.id),
                    reversed: !def.link.reversed,
                    ..def.link.clone()
                };
                board.tunnels.push(def.link);
                board.tunnels.push(reverse);
            } else {
                board.tunnels.push(def.link);
            }
        }

        let sides: Vec<SideId> = board.sides().iter().map(|s| s.id).collect();
        for side in sides {
            board.start_turn(side)?;
        }

        debug!(
            name = %file.name,
            units = board.units.len(),
            tunnels = board.tunnels.len(),
            orders = file.order.len(),
            "scenario loaded"
        );
        Ok(Self {
            name: file.name,
            board,
            orders: file.order,
        })
    }
}
