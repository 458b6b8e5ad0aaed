//! Movement integration tests: planning, turn plotting and execution together

use arc_tactics::battle::*;
use arc_tactics::core::{SideId, TacticsError};
use arc_tactics::movement::*;

fn flat_board(size: u32) -> GameBoard {
    let mut board = GameBoard::new(BattleMap::new(size, size));
    board.add_side(Side::new(SideId(1), "north")).unwrap();
    board.add_side(Side::new(SideId(2), "south")).unwrap();
    board
}

fn walker(side: u32, at: HexCoord, moves: u32) -> Unit {
    Unit::new("Walker", SideId(side), at, MovementType::uniform("flat", 1), moves)
}

fn hex(q: i32, r: i32) -> HexCoord {
    HexCoord::new(q, r)
}

fn straight(len: i32) -> Vec<HexCoord> {
    (0..len).map(|q| hex(q, 0)).collect()
}

#[test]
fn test_open_ground_route_is_straight() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();

    let route = plan_route(&mut RouteFinder::new(), &board, id, hex(4, 0)).unwrap();
    assert_eq!(route.move_cost, 4);
    assert_eq!(route.steps, straight(5));
}

#[test]
fn test_route_never_enters_enemy_hex() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();
    board.add_unit(walker(2, hex(4, 0), 5)).unwrap();
    let mut finder = RouteFinder::new();

    let onto_enemy = plan_route(&mut finder, &board, id, hex(4, 0)).unwrap();
    assert!(!onto_enemy.is_found());
    assert_eq!(onto_enemy.move_cost, NO_PATH_COST as i64);

    let past_enemy = plan_route(&mut finder, &board, id, hex(6, 0)).unwrap();
    assert!(past_enemy.is_found());
    assert!(!past_enemy.steps.contains(&hex(4, 0)));
    assert_eq!(past_enemy.steps.last(), Some(&hex(6, 0)));
}

#[test]
fn test_tunnel_shortcut() {
    let mut board = flat_board(16);
    board
        .tunnels
        .extend(TeleportLink::bidirectional("tunnel", hex(0, 0), hex(10, 10)));
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();

    let route = plan_route(&mut RouteFinder::new(), &board, id, hex(11, 10)).unwrap();
    assert_eq!(route.move_cost, 2);
    assert_eq!(route.steps, vec![hex(0, 0), hex(10, 10), hex(11, 10)]);

    let outcome = move_unit(&mut board, &mut NoEvents, MoveRequest::new(route.steps)).unwrap();
    assert_eq!(outcome.final_hex, hex(11, 10));
    assert_eq!(board.units.get(id).unwrap().movement_left, 3);
}

#[test]
fn test_long_route_leaves_resumable_order() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(0, 0), 3)).unwrap();
    let route = straight(6);

    let plan = plot_turn(&board, board.units.get(id).unwrap(), &route, 0, route.len());
    assert_eq!(plan.stop_index(), 3);

    let outcome = move_unit(&mut board, &mut NoEvents, MoveRequest::new(route)).unwrap();
    assert_eq!(outcome.final_hex, hex(3, 0));
    assert!(!outcome.interrupted);
    let goto = outcome.goto.unwrap();
    assert_eq!(goto.route, vec![hex(3, 0), hex(4, 0), hex(5, 0)]);
    assert_eq!(goto.destination, hex(5, 0));
    assert_eq!(board.units.get(id).unwrap().goto.as_ref(), Some(&goto));
}

#[test]
fn test_hidden_enemy_ambushes_mover() {
    let mut board = flat_board(16);
    let scout = board.add_unit(walker(1, hex(0, 5), 5)).unwrap();
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();
    let lurker = board
        .add_unit(walker(2, hex(2, 1), 5).with_concealment(Concealment::Always))
        .unwrap();

    let mut undo = UndoStack::new();
    let warmup = MoveRequest::new(vec![hex(0, 5), hex(1, 5)]).with_undo(&mut undo);
    move_unit(&mut board, &mut NoEvents, warmup).unwrap();
    assert_eq!(undo.len(), 1);
    assert_eq!(undo.last().map(|m| m.unit), Some(scout));

    let mut events = EventHandlers::new();
    let mut log = SpectatorLog::default();
    let request = MoveRequest::new(straight(4))
        .with_undo(&mut undo)
        .with_spectator(&mut log);
    let outcome = move_unit(&mut board, &mut events, request).unwrap();

    assert_eq!(outcome.final_hex, hex(1, 0));
    assert!(outcome.interrupted);
    assert_eq!(outcome.cause, Some(Interruption::Ambushed));
    assert!(outcome.undo_blocked);
    assert!(outcome.undo.is_none());
    assert!(undo.is_empty());
    assert_eq!(events.count(GameEventKind::Sighted), 1);
    assert_eq!(log.ambusher, Some(lurker));
    assert!(board.units.get(lurker).unwrap().uncovered);
    assert_eq!(board.units.get(id).unwrap().movement_left, 0);
    assert_eq!(outcome.alerts(), vec!["Ambushed!".to_string()]);
}

#[test]
fn test_script_relocating_mover_stops_cleanly() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();
    let mut events = EventHandlers::new();
    events.on(GameEventKind::EnterHex, |board, event| {
        match event.unit {
            Some(unit) if event.primary == HexCoord::new(1, 0) => {
                board.units.relocate(unit, HexCoord::new(1, 3)).is_ok()
            }
            _ => false,
        }
    });

    let mut undo = UndoStack::new();
    let request = MoveRequest::new(straight(5)).with_undo(&mut undo);
    let outcome = move_unit(&mut board, &mut events, request).unwrap();

    assert_eq!(outcome.final_hex, hex(1, 3));
    assert!(outcome.interrupted);
    assert_eq!(outcome.cause, Some(Interruption::ScriptEvent));
    assert!(outcome.flags.event_mutated);
    assert!(outcome.goto.is_none());
    assert!(outcome.undo.is_none());
    assert!(undo.is_empty());
    assert_eq!(board.units.get(id).unwrap().location(), hex(1, 3));
    assert_eq!(board.units.unit_at(hex(1, 0)).map(|u| u.id), None);
    let moveto = events
        .fired()
        .iter()
        .find(|e| e.kind == GameEventKind::MoveTo)
        .unwrap();
    assert_eq!(moveto.primary, hex(1, 3));
}

#[test]
fn test_quiet_script_relocation_is_still_noticed() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();
    let mut events = EventHandlers::new();
    events.on(GameEventKind::EnterHex, |board, event| {
        if let Some(unit) = event.unit {
            if event.primary == hex(2, 0) {
                let _ = board.units.relocate(unit, hex(1, 5));
            }
        }
        false
    });

    let outcome = move_unit(&mut board, &mut events, MoveRequest::new(straight(5))).unwrap();
    assert_eq!(outcome.final_hex, hex(1, 5));
    assert_eq!(outcome.cause, Some(Interruption::ScriptEvent));
    assert!(outcome.undo.is_none());
    assert_eq!(board.units.get(id).unwrap().location(), hex(1, 5));
    assert_eq!(events.count(GameEventKind::EnterHex), 2);
}

#[test]
fn test_script_without_board_changes_lets_move_continue() {
    let mut board = flat_board(16);
    board.add_unit(walker(1, hex(0, 0), 5)).unwrap();
    let mut events = EventHandlers::new();
    events.on(GameEventKind::EnterHex, |_, _| false);

    let outcome = move_unit(&mut board, &mut events, MoveRequest::new(straight(4))).unwrap();
    assert_eq!(outcome.final_hex, hex(3, 0));
    assert!(!outcome.interrupted);
    assert_eq!(events.count(GameEventKind::EnterHex), 3);
}

#[test]
fn test_zoc_stop_zeroes_movement() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(0, 0), 8)).unwrap();
    board.add_unit(walker(2, hex(4, 1), 5)).unwrap();

    let outcome = move_unit(&mut board, &mut NoEvents, MoveRequest::new(straight(7))).unwrap();
    assert_eq!(outcome.final_hex, hex(4, 0));
    assert!(outcome.zoc_stopped);
    assert!(!outcome.interrupted);
    assert_eq!(board.units.get(id).unwrap().movement_left, 0);
}

#[test]
fn test_undo_restores_unit_and_village() {
    let mut board = flat_board(16);
    board.map.set_terrain(hex(2, 0), Terrain::Village);
    let id = board.add_unit(walker(1, hex(0, 0), 5)).unwrap();

    let mut undo = UndoStack::new();
    let outcome = move_unit(
        &mut board,
        &mut NoEvents,
        MoveRequest::new(straight(3)).with_undo(&mut undo),
    )
    .unwrap();
    assert!(outcome.village_captured);
    assert_eq!(board.village_owner(hex(2, 0)), Some(SideId(1)));

    let undone = undo.undo(&mut board).unwrap().unwrap();
    assert_eq!(undone.unit, id);
    let unit = board.units.get(id).unwrap();
    assert_eq!(unit.location(), hex(0, 0));
    assert_eq!(unit.movement_left, 5);
    assert_eq!(board.village_owner(hex(2, 0)), None);
}

#[test]
fn test_recorded_moves_replay_identically() {
    let build = || {
        let mut board = flat_board(16);
        board.add_unit(walker(1, hex(0, 0), 3)).unwrap();
        board.add_unit(walker(2, hex(0, 8), 4)).unwrap();
        board
    };

    let mut board = build();
    let mut recorder = MoveRecorder::new();
    for route in [straight(6), vec![hex(0, 8), hex(1, 8), hex(2, 8)]] {
        let request = MoveRequest::new(route).with_recorder(&mut recorder);
        move_unit(&mut board, &mut NoEvents, request).unwrap();
    }
    assert_eq!(recorder.len(), 2);
    let json = recorder.to_json().unwrap();

    let restored = MoveRecorder::from_json(&json).unwrap();
    let mut fresh = build();
    let outcomes = replay_all(&mut fresh, &mut NoEvents, &restored).unwrap();
    assert!(outcomes.iter().all(|o| o.replay_mismatch.is_none()));
    assert_eq!(outcomes[0].final_hex, hex(3, 0));
    assert_eq!(outcomes[1].final_hex, hex(2, 8));

    let mut diverged = build();
    diverged.add_unit(walker(2, hex(3, 0), 1)).unwrap();
    let outcomes = replay_all(&mut diverged, &mut NoEvents, &restored).unwrap();
    assert_eq!(
        outcomes[0].replay_mismatch,
        Some(ReplayMismatch::Destination {
            expected: hex(3, 0),
            computed: hex(2, 0),
        })
    );
}

#[test]
fn test_move_range_respects_enemies() {
    let mut board = flat_board(16);
    let id = board.add_unit(walker(1, hex(5, 5), 2)).unwrap();
    board.add_unit(walker(2, hex(7, 5), 3)).unwrap();
    let unit = board.units.get(id).unwrap();

    let range = move_range(
        &mut ReachabilityCalculator::new(),
        &board,
        unit,
        MoveRangeOptions::default(),
    );
    assert!(range.contains(hex(5, 5)));
    assert!(range.contains(hex(6, 5)));
    assert!(!range.contains(hex(7, 5)));
    assert!(range.contains(hex(3, 5)));
}

#[test]
fn test_bad_requests_are_errors() {
    let mut board = flat_board(8);
    assert!(matches!(
        move_unit(&mut board, &mut NoEvents, MoveRequest::new(straight(3))),
        Err(TacticsError::NoUnitAt(_))
    ));
    let stranger = walker(9, hex(0, 0), 3);
    assert!(matches!(
        board.add_unit(stranger),
        Err(TacticsError::UnknownSide(SideId(9)))
    ));
}

#[test]
fn test_scenario_file_runs_end_to_end() {
    let content = r#"
        name = "corridor"
        map = [
            ". . . . . . . .",
            ". X X X X X . .",
            ". . . . . . . .",
        ]

        [[side]]
        id = 1
        team = "north"

        [[unit]]
        name = "Spearman"
        side = 1
        at = { q = 0, r = 0 }
        movetype = "smallfoot"
        moves = 5

        [[order]]
        from = { q = 0, r = 0 }
        goal = { q = 3, r = 2 }
    "#;
    let mut scenario = Scenario::from_toml_str(content).unwrap();
    let order = scenario.orders[0].clone();
    let board = &mut scenario.board;
    let id = board.units.find(order.from).unwrap();

    let route = plan_route(&mut RouteFinder::new(), board, id, order.goal).unwrap();
    assert!(route.is_found());
    assert!(route
        .steps
        .iter()
        .all(|&h| board.map.terrain(h) != Some(Terrain::Impassable)));

    let outcome = move_unit(board, &mut NoEvents, MoveRequest::new(route.steps.clone())).unwrap();
    assert_eq!(outcome.final_hex, *route.steps.last().unwrap());
}
