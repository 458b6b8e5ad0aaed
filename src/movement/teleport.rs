//! Teleport tunnels and the per-move graph built from them
//!
//! A tunnel connects every source hex to every target hex. The graph is
//! rebuilt for each move from the mover's own tunnels plus the board's,
//! filtered by who may use them and by what the viewer can see.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::battle::board::GameBoard;
use crate::battle::hex::HexCoord;
use crate::battle::units::Unit;
use crate::battle::visibility::{get_visible_unit, Viewer};
use crate::core::types::SideId;

/// A named tunnel definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeleportLink {
    pub id: String,
    pub sources: BTreeSet<HexCoord>,
    pub targets: BTreeSet<HexCoord>,
    /// Travel runs from targets to sources
    #[serde(default)]
    pub reversed: bool,
    /// Usable even when its endpoints are fogged for the viewer
    #[serde(default)]
    pub always_visible: bool,
    /// Allied units standing on a target do not block the tunnel
    #[serde(default)]
    pub pass_allied_units: bool,
    /// Sides allowed to use the tunnel; `None` allows everyone
    #[serde(default)]
    pub sides: Option<BTreeSet<SideId>>,
}

impl TeleportLink {
    pub fn new<S, T>(id: impl Into<String>, sources: S, targets: T) -> Self
    where
        S: IntoIterator<Item = HexCoord>,
        T: IntoIterator<Item = HexCoord>,
    {
        Self {
            id: id.into(),
            sources: sources.into_iter().collect(),
            targets: targets.into_iter().collect(),
            reversed: false,
            always_visible: false,
            pass_allied_units: false,
            sides: None,
        }
    }

    /// A tunnel usable both ways, as a forward and a reversed link
    pub fn bidirectional(id: impl Into<String>, a: HexCoord, b: HexCoord) -> [TeleportLink; 2] {
        let id = id.into();
        let forward = TeleportLink::new(id.clone(), [a], [b]);
        let mut back = TeleportLink::new(format!("{id}#reverse"), [a], [b]);
        back.reversed = true;
        [forward, back]
    }

    pub fn with_always_visible(mut self) -> Self {
        self.always_visible = true;
        self
    }

    pub fn with_pass_allied_units(mut self) -> Self {
        self.pass_allied_units = true;
        self
    }

    pub fn for_sides<I: IntoIterator<Item = SideId>>(mut self, sides: I) -> Self {
        self.sides = Some(sides.into_iter().collect());
        self
    }

    /// Entry and exit hexes, honoring `reversed`
    pub fn endpoints(&self) -> (&BTreeSet<HexCoord>, &BTreeSet<HexCoord>) {
        if self.reversed {
            (&self.targets, &self.sources)
        } else {
            (&self.sources, &self.targets)
        }
    }

    pub fn allows(&self, unit: &Unit) -> bool {
        self.sides.as_ref().map_or(true, |s| s.contains(&unit.side))
    }
}

/// Whose knowledge of the board decides which tunnels are usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    SeeAll,
    AsSeenBy(SideId),
    /// Nothing is visible (used by editors and debugging views)
    AsSeenByNobody,
}

/// Tunnels usable by one unit for one move
#[derive(Debug, Clone, Default)]
pub struct TeleportGraph {
    links_from: BTreeMap<HexCoord, BTreeSet<String>>,
    sources: BTreeMap<String, BTreeSet<HexCoord>>,
    targets: BTreeMap<String, BTreeSet<HexCoord>>,
    pass_allied: BTreeSet<String>,
}

impl TeleportGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collect the tunnels `unit` may take
    ///
    /// `ignore_units` keeps targets that are occupied. With `check_vision`,
    /// links the viewer could not know about are skipped entirely.
    pub fn build(
        board: &GameBoard,
        unit: &Unit,
        mode: VisibilityMode,
        ignore_units: bool,
        check_vision: bool,
    ) -> Self {
        let mut graph = Self::empty();
        let viewer_is_enemy = match mode {
            VisibilityMode::SeeAll => false,
            VisibilityMode::AsSeenBy(side) => board.is_enemy(side, unit.side),
            VisibilityMode::AsSeenByNobody => true,
        };

        for link in unit.tunnels.iter().chain(board.tunnels.iter()) {
            if !link.allows(unit) {
                continue;
            }
            if check_vision && !link.always_visible && viewer_is_enemy {
                continue;
            }
            let hide_fogged =
                mode != VisibilityMode::SeeAll && !link.always_visible && viewer_is_enemy;
            let known = |loc: HexCoord| {
                board.map.in_bounds(loc) && !(hide_fogged && hex_fogged(board, mode, loc))
            };

            let (from, to) = link.endpoints();
            let sources: BTreeSet<HexCoord> = from.iter().copied().filter(|&l| known(l)).collect();
            let mut targets: BTreeSet<HexCoord> = to.iter().copied().filter(|&l| known(l)).collect();

            if !link.pass_allied_units && !ignore_units && !check_vision {
                let viewer = match mode {
                    VisibilityMode::SeeAll => Some(Viewer::SeeAll),
                    VisibilityMode::AsSeenBy(side) => Some(Viewer::Side(side)),
                    VisibilityMode::AsSeenByNobody => None,
                };
                if let Some(viewer) = viewer {
                    targets.retain(|&t| get_visible_unit(board, t, viewer).is_none());
                }
            }

            for src in sources.iter() {
                graph
                    .links_from
                    .entry(*src)
                    .or_default()
                    .insert(link.id.clone());
            }
            if link.pass_allied_units {
                graph.pass_allied.insert(link.id.clone());
            }
            graph.sources.entry(link.id.clone()).or_insert(sources);
            graph.targets.entry(link.id.clone()).or_insert(targets);
        }
        graph
    }

    pub fn is_empty(&self) -> bool {
        self.links_from.is_empty()
    }

    /// Every hex reachable by teleport from `loc`
    pub fn adjacent_links(&self, loc: HexCoord) -> BTreeSet<HexCoord> {
        let mut out = BTreeSet::new();
        let Some(ids) = self.links_from.get(&loc) else {
            return out;
        };
        for id in ids {
            if let Some(targets) = self.targets.get(id) {
                out.extend(targets.iter().filter(|&&t| t != loc));
            }
        }
        out
    }

    pub fn sources(&self) -> BTreeSet<HexCoord> {
        self.sources.values().flatten().copied().collect()
    }

    pub fn targets(&self) -> BTreeSet<HexCoord> {
        self.targets.values().flatten().copied().collect()
    }

    /// Does a link from `from` to `to` let the mover pass allied units?
    pub fn passes_allied_units(&self, from: HexCoord, to: HexCoord) -> bool {
        self.links_from.get(&from).map_or(false, |ids| {
            ids.iter().any(|id| {
                self.pass_allied.contains(id)
                    && self.targets.get(id).map_or(false, |t| t.contains(&to))
            })
        })
    }
}

fn hex_fogged(board: &GameBoard, mode: VisibilityMode, loc: HexCoord) -> bool {
    match mode {
        VisibilityMode::SeeAll => false,
        VisibilityMode::AsSeenBy(side) => board.side(side).map_or(false, |s| s.fogged(loc)),
        VisibilityMode::AsSeenByNobody => true,
    }
}
