//! Battle map: a dense rectangular grid of terrain
//!
//! Axial coordinates with `0 <= q < width` and `0 <= r < height`. Storage is a
//! flat vector indexed by `r * width + q`, which the search code relies on for
//! its per-hex node arrays.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::hex::HexCoord;
use crate::battle::terrain::Terrain;
use crate::core::error::{Result, TacticsError};

/// The full battle map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleMap {
    pub width: u32,
    pub height: u32,
    tiles: Vec<Terrain>,
}

impl BattleMap {
    /// Create a new battle map of flat terrain
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Terrain::Flat; (width * height) as usize],
        }
    }

    /// Parse a map from rows of terrain glyphs (row index is `r`)
    ///
    /// Whitespace inside a row is ignored so maps can be written spaced out.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let parsed: Vec<Vec<Terrain>> = rows
            .iter()
            .map(|row| {
                row.as_ref()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| {
                        Terrain::from_glyph(c)
                            .ok_or_else(|| TacticsError::UnknownTerrain(c.to_string()))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let width = parsed.first().map(|row| row.len()).unwrap_or(0);
        if parsed.iter().any(|row| row.len() != width) {
            return Err(TacticsError::InvalidConfig(
                "map rows must all have the same width".into(),
            ));
        }

        Ok(Self {
            width: width as u32,
            height: parsed.len() as u32,
            tiles: parsed.into_iter().flatten().collect(),
        })
    }

    /// Scatter random terrain over a flat map (used for demos and benchmarks)
    pub fn scatter<R: Rng>(&mut self, rng: &mut R, density: f64) {
        const SCATTER: [Terrain; 6] = [
            Terrain::Forest,
            Terrain::Hills,
            Terrain::Mountains,
            Terrain::ShallowWater,
            Terrain::Village,
            Terrain::Road,
        ];
        for tile in &mut self.tiles {
            if rng.gen_bool(density) {
                *tile = SCATTER[rng.gen_range(0..SCATTER.len())];
            }
        }
    }

    /// Number of hexes on the map
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Check if coordinate is within map bounds
    pub fn in_bounds(&self, coord: HexCoord) -> bool {
        coord.q >= 0
            && coord.r >= 0
            && coord.q < self.width as i32
            && coord.r < self.height as i32
    }

    /// Dense index of an on-board coordinate
    pub fn index(&self, coord: HexCoord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| coord.r as usize * self.width as usize + coord.q as usize)
    }

    /// Coordinate stored at a dense index
    pub fn coord_at(&self, index: usize) -> HexCoord {
        let width = self.width as usize;
        HexCoord::new((index % width) as i32, (index / width) as i32)
    }

    /// Terrain at a coordinate, `None` when off the board
    pub fn terrain(&self, coord: HexCoord) -> Option<Terrain> {
        self.index(coord).map(|i| self.tiles[i])
    }

    /// Set terrain at a coordinate (ignored when off the board)
    pub fn set_terrain(&mut self, coord: HexCoord, terrain: Terrain) {
        if let Some(i) = self.index(coord) {
            self.tiles[i] = terrain;
        }
    }

    pub fn is_village(&self, coord: HexCoord) -> bool {
        self.terrain(coord).is_some_and(|t| t.is_village())
    }

    /// All on-board coordinates in ascending order
    pub fn hexes(&self) -> impl Iterator<Item = HexCoord> + '_ {
        (0..self.width as i32)
            .flat_map(move |q| (0..self.height as i32).map(move |r| HexCoord::new(q, r)))
    }

    /// All village hexes in ascending order
    pub fn villages(&self) -> impl Iterator<Item = HexCoord> + '_ {
        self.hexes().filter(|c| self.is_village(*c))
    }
}
