//! Property tests for route search, reachability and turn plotting

use arc_tactics::battle::*;
use arc_tactics::core::SideId;
use arc_tactics::movement::*;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const SIZE: i32 = 12;

fn rough_board(seed: u64) -> GameBoard {
    let mut map = BattleMap::new(SIZE as u32, SIZE as u32);
    map.scatter(&mut ChaCha8Rng::seed_from_u64(seed), 0.35);
    let mut board = GameBoard::new(map);
    board.add_side(Side::new(SideId(1), "north")).unwrap();
    board
}

fn any_hex() -> impl Strategy<Value = HexCoord> {
    (0..SIZE, 0..SIZE).prop_map(|(q, r)| HexCoord::new(q, r))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn uniform_cost_equals_hex_distance(src in any_hex(), dst in any_hex()) {
        let map = BattleMap::new(SIZE as u32, SIZE as u32);
        let route = RouteFinder::new().search(&map, src, dst, 1000.0, &UniformCost, None);
        let distance = src.distance(&dst);
        prop_assert_eq!(route.move_cost, i64::from(distance));
        prop_assert_eq!(route.steps.len(), distance as usize + 1);
        prop_assert!(route.steps.windows(2).all(|w| w[0].is_adjacent(&w[1])));
    }

    #[test]
    fn more_movement_never_shrinks_range(seed in any::<u64>(), at in any_hex(), moves in 1_u32..7) {
        let mut board = rough_board(seed);
        board.map.set_terrain(at, Terrain::Flat);
        let unit = Unit::new("Runner", SideId(1), at, MovementType::smallfoot(), moves);
        let faster = Unit::new("Runner", SideId(1), at, MovementType::smallfoot(), moves + 1);
        let mut calc = ReachabilityCalculator::new();

        let small = move_range(&mut calc, &board, &unit, MoveRangeOptions::default());
        let large = move_range(&mut calc, &board, &faster, MoveRangeOptions::default());
        for hex in small.destinations.keys() {
            prop_assert!(large.contains(*hex), "seed={seed}: {hex} lost with more movement");
        }
    }

    #[test]
    fn plotted_turn_fits_the_budget(seed in any::<u64>(), goal in any_hex(), moves in 1_u32..9) {
        let mut board = rough_board(seed);
        let start = HexCoord::new(0, 0);
        board.map.set_terrain(start, Terrain::Flat);
        let id = board
            .add_unit(Unit::new("Walker", SideId(1), start, MovementType::smallfoot(), moves))
            .unwrap();
        let route = plan_route(&mut RouteFinder::new(), &board, id, goal).unwrap();
        prop_assume!(route.steps.len() > 1);

        let unit = board.units.get(id).unwrap();
        let plan = plot_turn(&board, unit, &route.steps, 0, route.steps.len());
        let spent: u32 = route.steps[1..plan.end.max(1)]
            .iter()
            .filter_map(|&h| board.map.terrain(h).and_then(|t| unit.movement_cost(t)))
            .sum();
        prop_assert!(spent <= moves, "seed={seed}: spent {spent} of {moves}");
        prop_assert_eq!(plan.moves_left.back().copied().unwrap_or(moves), moves - spent);
    }

    #[test]
    fn stopped_move_is_a_prefix_of_its_route(seed in any::<u64>(), goal in any_hex(), moves in 1_u32..6) {
        let mut board = rough_board(seed);
        let start = HexCoord::new(0, 0);
        board.map.set_terrain(start, Terrain::Flat);
        let id = board
            .add_unit(Unit::new("Walker", SideId(1), start, MovementType::smallfoot(), moves))
            .unwrap();
        let route = plan_route(&mut RouteFinder::new(), &board, id, goal).unwrap();
        prop_assume!(route.steps.len() > 1);

        let outcome = move_unit(&mut board, &mut NoEvents, MoveRequest::new(route.steps.clone())).unwrap();
        prop_assert_eq!(outcome.final_hex, route.steps[outcome.steps]);
        prop_assert_eq!(board.units.get(id).unwrap().location(), outcome.final_hex);
        if let Some(goto) = outcome.goto {
            prop_assert_eq!(&route.steps[outcome.steps..], goto.route.as_slice());
        }
    }
}
