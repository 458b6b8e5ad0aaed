//! Movement configuration with documented defaults
//!
//! These knobs change how moves are interrupted and costed. They are loaded
//! from TOML and carried on the board context rather than held globally.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TacticsError};

/// Configuration for movement planning and execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Whether sighting only allied units interrupts a move
    ///
    /// Enemy sightings always interrupt (unless the move skips sightings).
    pub ally_sighted_interrupts: bool,

    /// Whether capturing a village grants the capturing side a time bonus
    pub village_time_bonus: bool,

    /// Whether route costs carry the tiny defense/occupancy sub-cost
    ///
    /// The sub-cost is divided by 10000 so it only breaks ties between
    /// routes with the same movement cost.
    pub defense_tiebreak: bool,

    /// Turns simulated when planning a multi-turn goto route
    pub max_route_turns: u32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            ally_sighted_interrupts: true,
            village_time_bonus: false,
            defense_tiebreak: true,
            max_route_turns: 8,
        }
    }
}

impl MovementConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MovementConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_route_turns == 0 {
            return Err(TacticsError::InvalidConfig(
                "max_route_turns must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
