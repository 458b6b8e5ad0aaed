//! Recording moves and replaying them on another board
//!
//! A move is recorded as its full planned route plus the sighting policy.
//! Replaying drives the same executor; a replayed unit that ends somewhere
//! else than recorded is a desync, reported but not fatal.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::battle::board::GameBoard;
use crate::battle::events::EventPump;
use crate::battle::hex::HexCoord;
use crate::core::error::Result;
use crate::movement::executor::{move_unit, MoveOutcome, MoveRequest, SkipSighted};
use crate::movement::undo::UndoStack;

/// The synced "move" command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCommand {
    pub route: Vec<HexCoord>,
    #[serde(default)]
    pub skip_sighted: SkipSighted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMove {
    pub command: MoveCommand,
    /// Where the unit ended up when the command was first executed
    pub final_hex: Option<HexCoord>,
}

/// Soft replay error: execution continues with the local result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReplayMismatch {
    Destination {
        expected: HexCoord,
        computed: HexCoord,
    },
    /// The recorded command could not move the unit at all
    NoMovement { expected: HexCoord, at: HexCoord },
}

/// Log of executed move commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecorder {
    moves: Vec<RecordedMove>,
}

impl MoveRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; returns its index
    pub fn record(&mut self, command: MoveCommand) -> usize {
        self.moves.push(RecordedMove {
            command,
            final_hex: None,
        });
        self.moves.len() - 1
    }

    pub fn set_final_hex(&mut self, index: usize, hex: HexCoord) {
        if let Some(entry) = self.moves.get_mut(index) {
            entry.final_hex = Some(hex);
        }
    }

    pub fn moves(&self) -> &[RecordedMove] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Replay one recorded command, checking the unit ends on `expected_final`
pub fn replay_move(
    board: &mut GameBoard,
    events: &mut dyn EventPump,
    command: &MoveCommand,
    expected_final: HexCoord,
    undo: Option<&mut UndoStack>,
) -> Result<MoveOutcome> {
    let mut request = MoveRequest::new(command.route.clone())
        .skip_sighted(command.skip_sighted)
        .expecting(expected_final);
    request.undo = undo;
    move_unit(board, events, request)
}

/// Replay a whole log in order; moves without a recorded end are replayed
/// unchecked
pub fn replay_all(
    board: &mut GameBoard,
    events: &mut dyn EventPump,
    recorder: &MoveRecorder,
) -> Result<Vec<MoveOutcome>> {
    let mut outcomes = Vec::with_capacity(recorder.len());
    for (index, entry) in recorder.moves().iter().enumerate() {
        let outcome = match entry.final_hex {
            Some(expected) => replay_move(board, events, &entry.command, expected, None)?,
            None => {
                let request = MoveRequest::new(entry.command.route.clone())
                    .skip_sighted(entry.command.skip_sighted);
                move_unit(board, events, request)?
            }
        };
        if outcome.replay_mismatch.is_some() {
            warn!(index, "replayed move diverged from the recording");
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let command = MoveCommand {
            route: vec![HexCoord::new(0, 0), HexCoord::new(1, 0)],
            skip_sighted: SkipSighted::AlliesOnly,
        };
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"allies_only\""));
        let back: MoveCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_recorder_tracks_final_hexes() {
        let mut recorder = MoveRecorder::new();
        let index = recorder.record(MoveCommand {
            route: vec![HexCoord::new(0, 0), HexCoord::new(1, 0)],
            skip_sighted: SkipSighted::None,
        });
        recorder.set_final_hex(index, HexCoord::new(1, 0));
        let json = recorder.to_json().unwrap();
        let restored = MoveRecorder::from_json(&json).unwrap();
        assert_eq!(restored.moves()[0].final_hex, Some(HexCoord::new(1, 0)));
    }
}
