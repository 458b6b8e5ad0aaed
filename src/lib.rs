//! Arc Tactics - hex-grid movement for turn-based tactical battles
//!
//! Plans routes with A*, works out what a unit can reach this turn, and
//! walks units along their routes while fog, ambushes, zones of control
//! and scripted events get a say.

pub mod battle;
pub mod core;
pub mod movement;
