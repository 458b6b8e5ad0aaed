//! Headless move simulator
//!
//! Loads a TOML scenario, plans and executes each of its orders, and prints
//! the outcomes as JSON. A recorded move log can be written out and replayed
//! against the same scenario to check that moves are deterministic.

use std::path::PathBuf;
use std::process::ExitCode;

use arc_tactics::battle::{EventHandlers, GameEventKind, HexCoord, Scenario};
use arc_tactics::core::{MovementConfig, Result, TacticsError};
use arc_tactics::movement::{
    move_range, move_unit, plan_route, replay_all, MoveOutcome, MoveRangeOptions, MoveRecorder,
    MoveRequest, ReachabilityCalculator, RouteFinder, SpectatorLog, UndoStack,
};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

/// Plan and execute the orders in a battle scenario
#[derive(Parser, Debug)]
#[command(name = "move_sim")]
#[command(about = "Plan and execute unit moves on a hex battle map")]
struct Args {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Movement config overriding the scenario's own
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the executed move commands to this file (JSON)
    #[arg(long)]
    record: Option<PathBuf>,

    /// Replay a recorded move log instead of running the scenario's orders
    #[arg(long, conflicts_with = "record")]
    replay: Option<PathBuf>,

    /// Also list the hexes each unit could reach before moving
    #[arg(long)]
    show_range: bool,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,
}

#[derive(Serialize)]
struct OrderReport {
    from: HexCoord,
    goal: HexCoord,
    route: Vec<HexCoord>,
    route_cost: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reachable: Option<Vec<HexCoord>>,
    outcome: Option<MoveOutcome>,
    alerts: Vec<String>,
}

#[derive(Serialize)]
struct SimReport {
    scenario: String,
    orders: Vec<OrderReport>,
    events_fired: usize,
    undo_depth: usize,
}

#[derive(Serialize)]
struct ReplayReport {
    scenario: String,
    replayed: usize,
    mismatches: usize,
    outcomes: Vec<MoveOutcome>,
}

fn load_scenario(args: &Args) -> Result<Scenario> {
    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(path) = &args.config {
        scenario.board.config = MovementConfig::load(path)?;
    }
    Ok(scenario)
}

fn run_orders(args: &Args) -> Result<String> {
    let mut scenario = load_scenario(args)?;
    let board = &mut scenario.board;
    let mut finder = RouteFinder::new();
    let mut reach = ReachabilityCalculator::new();
    let mut events = EventHandlers::new();
    let mut undo = UndoStack::new();
    let mut recorder = MoveRecorder::new();
    let mut reports = Vec::with_capacity(scenario.orders.len());

    for order in &scenario.orders {
        let unit = board
            .units
            .unit_at(order.from)
            .ok_or(TacticsError::NoUnitAt(order.from))?;
        let unit_id = unit.id;
        let reachable = args.show_range.then(|| {
            let options = MoveRangeOptions {
                viewing_side: Some(unit.side),
                ..MoveRangeOptions::default()
            };
            move_range(&mut reach, board, unit, options)
                .destinations
                .keys()
                .copied()
                .collect()
        });

        let route = plan_route(&mut finder, board, unit_id, order.goal)?;
        if !route.is_found() {
            warn!(from = %order.from, goal = %order.goal, "no route");
            reports.push(OrderReport {
                from: order.from,
                goal: order.goal,
                route: Vec::new(),
                route_cost: None,
                reachable,
                outcome: None,
                alerts: Vec::new(),
            });
            continue;
        }

        let mut log = SpectatorLog::default();
        let request = MoveRequest::new(route.steps.clone())
            .skip_sighted(order.skip_sighted)
            .with_spectator(&mut log)
            .with_undo(&mut undo)
            .with_recorder(&mut recorder);
        let outcome = move_unit(board, &mut events, request)?;
        info!(
            from = %order.from,
            to = %outcome.final_hex,
            cost = route.move_cost,
            "order executed"
        );
        reports.push(OrderReport {
            from: order.from,
            goal: order.goal,
            route: route.steps,
            route_cost: Some(route.move_cost),
            reachable,
            alerts: outcome.alerts(),
            outcome: Some(outcome),
        });
    }

    if let Some(path) = &args.record {
        std::fs::write(path, recorder.to_json()?)?;
        info!(path = %path.display(), moves = recorder.len(), "move log written");
    }

    let report = SimReport {
        scenario: scenario.name.clone(),
        orders: reports,
        events_fired: events.fired().len(),
        undo_depth: undo.len(),
    };
    if args.format == "text" {
        Ok(text_report(&report))
    } else {
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

fn run_replay(args: &Args, log_path: &PathBuf) -> Result<String> {
    let mut scenario = load_scenario(args)?;
    let recorder = MoveRecorder::from_json(&std::fs::read_to_string(log_path)?)?;
    let mut events = EventHandlers::new();
    let outcomes = replay_all(&mut scenario.board, &mut events, &recorder)?;
    let mismatches = outcomes
        .iter()
        .filter(|o| o.replay_mismatch.is_some())
        .count();
    info!(
        replayed = outcomes.len(),
        mismatches,
        sighted = events.count(GameEventKind::Sighted),
        "replay finished"
    );
    let report = ReplayReport {
        scenario: scenario.name,
        replayed: outcomes.len(),
        mismatches,
        outcomes,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn text_report(report: &SimReport) -> String {
    let mut out = format!("Scenario: {}\n", report.scenario);
    for order in &report.orders {
        match &order.outcome {
            None => out.push_str(&format!("{} -> {}: no route\n", order.from, order.goal)),
            Some(outcome) => {
                out.push_str(&format!(
                    "{} -> {}: cost {} moved {} step(s) to {}",
                    order.from,
                    order.goal,
                    order.route_cost.unwrap_or_default(),
                    outcome.steps,
                    outcome.final_hex
                ));
                if let Some(cause) = outcome.cause {
                    out.push_str(&format!(" (stopped: {cause:?})"));
                }
                out.push('\n');
                for alert in &order.alerts {
                    out.push_str(&format!("  ! {alert}\n"));
                }
            }
        }
    }
    out.push_str(&format!(
        "Events fired: {}, undo depth: {}\n",
        report.events_fired, report.undo_depth
    ));
    out
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("arc_tactics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = match &args.replay {
        Some(log) => run_replay(&args, log),
        None => run_orders(&args),
    };
    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
