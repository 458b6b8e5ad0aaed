//! Script event hooks fired while a unit moves
//!
//! Movement code does not know what handlers do. It only learns, from the
//! return value and the tracking counter, that something may have changed
//! on the board and that cached state must be looked up again.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::battle::board::GameBoard;
use crate::battle::hex::HexCoord;
use crate::core::types::{SideId, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEventKind {
    /// The mover entered a hex
    EnterHex,
    /// The mover is about to leave a hex
    ExitHex,
    /// A previously unseen unit was spotted
    Sighted,
    /// A move finished
    MoveTo,
    /// A village changed hands
    Capture,
}

impl GameEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEventKind::EnterHex => "enter_hex",
            GameEventKind::ExitHex => "exit_hex",
            GameEventKind::Sighted => "sighted",
            GameEventKind::MoveTo => "moveto",
            GameEventKind::Capture => "capture",
        }
    }
}

/// A fired event
///
/// For hex events `primary` is the hex being entered or left and
/// `secondary` the other end of the step. For `Sighted`, `unit` is the
/// unit that was seen and `secondary` the location it was seen from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: GameEventKind,
    pub unit: Option<UnitId>,
    pub primary: HexCoord,
    pub secondary: Option<HexCoord>,
    /// Previous owner of a captured village
    pub previous_owner: Option<SideId>,
}

impl GameEvent {
    pub fn new(kind: GameEventKind, unit: Option<UnitId>, primary: HexCoord) -> Self {
        Self {
            kind,
            unit,
            primary,
            secondary: None,
            previous_owner: None,
        }
    }

    pub fn with_secondary(mut self, secondary: HexCoord) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_previous_owner(mut self, owner: Option<SideId>) -> Self {
        self.previous_owner = owner;
        self
    }
}

/// Something that runs script callbacks for game events
pub trait EventPump {
    /// Fire `event`; returns whether a handler reported a mutation
    fn fire(&mut self, board: &mut GameBoard, event: &GameEvent) -> bool;

    /// Monotonic counter bumped whenever any handler runs
    fn tracking(&self) -> u64;
}

/// An event pump with no handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl EventPump for NoEvents {
    fn fire(&mut self, _board: &mut GameBoard, _event: &GameEvent) -> bool {
        false
    }

    fn tracking(&self) -> u64 {
        0
    }
}

pub type EventHandler = Box<dyn FnMut(&mut GameBoard, &GameEvent) -> bool>;

/// Registry of closures keyed by event kind
///
/// Every fired event is logged, whether or not a handler ran.
#[derive(Default)]
pub struct EventHandlers {
    handlers: Vec<(GameEventKind, EventHandler)>,
    tracking: u64,
    fired: Vec<GameEvent>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it returns `true` when it changed the board
    pub fn on<F>(&mut self, kind: GameEventKind, handler: F)
    where
        F: FnMut(&mut GameBoard, &GameEvent) -> bool + 'static,
    {
        self.handlers.push((kind, Box::new(handler)));
    }

    pub fn fired(&self) -> &[GameEvent] {
        &self.fired
    }

    pub fn count(&self, kind: GameEventKind) -> usize {
        self.fired.iter().filter(|e| e.kind == kind).count()
    }
}

impl EventPump for EventHandlers {
    fn fire(&mut self, board: &mut GameBoard, event: &GameEvent) -> bool {
        trace!(event = event.kind.as_str(), at = %event.primary, "firing event");
        self.fired.push(event.clone());
        let mut mutated = false;
        for (kind, handler) in self.handlers.iter_mut() {
            if *kind != event.kind {
                continue;
            }
            self.tracking += 1;
            mutated |= handler(board, event);
        }
        mutated
    }

    fn tracking(&self) -> u64 {
        self.tracking
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("handlers", &self.handlers.len())
            .field("tracking", &self.tracking)
            .field("fired", &self.fired.len())
            .finish()
    }
}
