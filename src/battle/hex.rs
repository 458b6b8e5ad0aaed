//! Hex coordinate system for battle maps (axial coordinates)
//!
//! Uses axial coordinates (q, r) for easy neighbor calculation. Coordinates are
//! totally ordered (q first, then r) so they can key ordered maps and give
//! deterministic iteration.

use serde::{Deserialize, Serialize};

/// Axial hex coordinate: one Location on the battle map
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Cube coordinate S (derived from q and r)
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Manhattan distance in hex space
    pub fn distance(&self, other: &Self) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Get all 6 neighboring hex coordinates
    pub fn neighbors(&self) -> [HexCoord; 6] {
        HexDirection::all().map(|dir| *self + dir.offset())
    }

    /// Do the two hexes share an edge?
    pub fn is_adjacent(&self, other: &Self) -> bool {
        self.distance(other) == 1
    }

    /// Squared on-screen distance, in units of one hex height
    ///
    /// Columns are staggered by half a hex and packed at 3/4 of a hex width.
    pub fn screen_distance_sq(&self, other: &Self) -> f64 {
        let dq = f64::from(self.q - other.q);
        let dr = f64::from(self.r - other.r);
        let x = dq * 0.75;
        let y = dr + dq * 0.5;
        x * x + y * y
    }

    /// The facing a unit takes when stepping from `self` towards `other`
    ///
    /// Non-adjacent targets (teleports) resolve to the closest of the six
    /// directions.
    pub fn direction_to(&self, other: &Self) -> HexDirection {
        let dq = other.q - self.q;
        let dr = other.r - self.r;
        let ds = -dq - dr;
        let mut best = HexDirection::default();
        let mut best_dot = i32::MIN;
        for dir in HexDirection::all() {
            let o = dir.offset();
            let dot = dq * o.q + dr * o.r + ds * o.s();
            if dot > best_dot {
                best_dot = dot;
                best = dir;
            }
        }
        best
    }
}

impl std::ops::Add for HexCoord {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.q + rhs.q, self.r + rhs.r)
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.q, self.r)
    }
}

/// Direction enum for hex facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HexDirection {
    #[default]
    East,
    NorthEast,
    NorthWest,
    West,
    SouthWest,
    SouthEast,
}

impl HexDirection {
    /// Get the hex offset for this direction
    pub fn offset(&self) -> HexCoord {
        match self {
            HexDirection::East => HexCoord::new(1, 0),
            HexDirection::NorthEast => HexCoord::new(1, -1),
            HexDirection::NorthWest => HexCoord::new(0, -1),
            HexDirection::West => HexCoord::new(-1, 0),
            HexDirection::SouthWest => HexCoord::new(-1, 1),
            HexDirection::SouthEast => HexCoord::new(0, 1),
        }
    }

    /// Get opposite direction
    pub fn opposite(&self) -> Self {
        match self {
            HexDirection::East => HexDirection::West,
            HexDirection::NorthEast => HexDirection::SouthWest,
            HexDirection::NorthWest => HexDirection::SouthEast,
            HexDirection::West => HexDirection::East,
            HexDirection::SouthWest => HexDirection::NorthEast,
            HexDirection::SouthEast => HexDirection::NorthWest,
        }
    }

    /// All directions
    pub fn all() -> [HexDirection; 6] {
        [
            HexDirection::East,
            HexDirection::NorthEast,
            HexDirection::NorthWest,
            HexDirection::West,
            HexDirection::SouthWest,
            HexDirection::SouthEast,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_distance_same() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.distance(&a), 0);
    }

    #[test]
    fn test_hex_distance_adjacent() {
        let a = HexCoord::new(0, 0);
        for n in a.neighbors() {
            assert_eq!(a.distance(&n), 1);
            assert!(a.is_adjacent(&n));
        }
    }

    #[test]
    fn test_hex_distance_straight_line() {
        assert_eq!(HexCoord::new(0, 0).distance(&HexCoord::new(4, 0)), 4);
        assert_eq!(HexCoord::new(0, 0).distance(&HexCoord::new(3, -3)), 3);
    }

    #[test]
    fn test_ordering_is_q_then_r() {
        assert!(HexCoord::new(0, 5) < HexCoord::new(1, 0));
        assert!(HexCoord::new(1, 0) < HexCoord::new(1, 1));
    }

    #[test]
    fn test_direction_to_neighbors() {
        let origin = HexCoord::new(3, 3);
        for dir in HexDirection::all() {
            assert_eq!(origin.direction_to(&(origin + dir.offset())), dir);
        }
    }

    #[test]
    fn test_direction_to_distant_hex() {
        let origin = HexCoord::new(0, 0);
        assert_eq!(origin.direction_to(&HexCoord::new(10, 0)), HexDirection::East);
        assert_eq!(origin.direction_to(&HexCoord::new(-7, 0)), HexDirection::West);
    }

    #[test]
    fn test_screen_distance_prefers_straight_rows() {
        let origin = HexCoord::new(0, 0);
        assert!(origin.screen_distance_sq(&HexCoord::new(1, 0)) > 0.0);
        assert_eq!(origin.screen_distance_sq(&origin), 0.0);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(HexDirection::East.opposite(), HexDirection::West);
        assert_eq!(HexDirection::NorthEast.opposite(), HexDirection::SouthWest);
    }
}
