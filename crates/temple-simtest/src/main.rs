//! Temple Planner Headless Harness
//!
//! Runs the scenario suite and a seeded random sweep through the search
//! engine and checks structural invariants on every result.
//! Runs entirely in-process with no runtime file access or networking.
//!
//! Usage:
//!   cargo run -p temple-simtest
//!   cargo run -p temple-simtest -- --verbose
//!   cargo run -p temple-simtest -- --seed 7

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use temple_logic::actions::{generate_actions, ResourcePool};
use temple_logic::connectivity::{has_loop, update_connectivity};
use temple_logic::constants::{EXIT_POS, FOYER_POS, GRID_SIZE};
use temple_logic::grid::{Coord, PlacementAction, TempleState};
use temple_logic::heuristic::{is_goal_state, Goal};
use temple_logic::metrics::TempleMetrics;
use temple_logic::rules::RoomRuleTable;
use temple_logic::search::{SearchEngine, SearchOptions, SearchOutcome};
use temple_logic::temple_config::{build_state, diagnose, validate_config, TempleConfig};
use temple_logic::validation::ConstraintValidator;

// ── Scenario suite ──────────────────────────────────────────────────────
const SCENARIOS_JSON: &str = include_str!("../../../data/scenarios.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    config: TempleConfig,
    /// `None`: either outcome is acceptable, only invariants are checked.
    expect_found: Option<bool>,
    #[serde(default)]
    max_actions: Option<usize>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let seed = args
        .iter()
        .position(|a| a == "--seed")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(42u64);
    println!("=== Temple Planner Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario suite
    results.extend(run_scenarios(verbose));

    // 2. Random architect sweep
    results.extend(sweep_architects(seed, verbose));

    // 3. Random placement walks
    results.extend(random_walks(seed, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

/// Replay `actions` from `initial` through the validator. Returns the
/// resulting state or a description of the first rejected placement.
fn replay(
    initial: &TempleState,
    actions: &[PlacementAction],
    rules: &RoomRuleTable,
    architect_max_neighbors: usize,
) -> Result<TempleState, String> {
    let validator = ConstraintValidator::with_architect_limit(rules, architect_max_neighbors);
    let mut state = initial.clone();
    for (i, action) in actions.iter().enumerate() {
        let result = validator.validate_placement(&state, action);
        if !result.valid {
            let reasons: Vec<String> = result.violations.iter().map(|v| v.to_string()).collect();
            return Err(format!("step {} ({}) rejected: {}", i + 1, action, reasons.join("; ")));
        }
        state.apply(action);
        update_connectivity(&mut state, rules);
    }
    Ok(state)
}

/// Structural checks shared by every search result.
fn check_outcome(
    name: &str,
    initial: &TempleState,
    outcome: &SearchOutcome,
    goal: &Goal,
    rules: &RoomRuleTable,
    options: &SearchOptions,
) -> Vec<TestResult> {
    let mut results = Vec::new();

    match replay(initial, &outcome.actions, rules, options.architect_max_neighbors) {
        Ok(state) => results.push(TestResult {
            name: format!("{}_replay", name),
            passed: state.canonical_key() == outcome.final_state.canonical_key(),
            detail: format!("{} placements replayed", outcome.actions.len()),
        }),
        Err(e) => results.push(TestResult {
            name: format!("{}_replay", name),
            passed: false,
            detail: e,
        }),
    }

    results.push(TestResult {
        name: format!("{}_no_loop", name),
        passed: !has_loop(&outcome.final_state, rules),
        detail: "final state is a tree".into(),
    });

    let architect = outcome.final_state.architect();
    let neighbors = outcome.final_state.occupied_neighbors(architect).count();
    results.push(TestResult {
        name: format!("{}_architect_limit", name),
        passed: neighbors <= options.architect_max_neighbors,
        detail: format!(
            "architect has {} occupied neighbours (max {})",
            neighbors, options.architect_max_neighbors
        ),
    });

    results.push(TestResult {
        name: format!("{}_goal_flag", name),
        passed: is_goal_state(&outcome.final_state, goal) == outcome.found,
        detail: format!("found={} ({})", outcome.found, outcome.stats.stop_reason.name()),
    });

    results
}

// ── 1. Scenario suite ───────────────────────────────────────────────────

fn run_scenarios(verbose: bool) -> Vec<TestResult> {
    println!("--- Scenarios ---");
    let mut results = Vec::new();

    let scenarios: Vec<Scenario> = match serde_json::from_str(SCENARIOS_JSON) {
        Ok(s) => s,
        Err(e) => {
            results.push(TestResult {
                name: "scenarios_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "scenarios_not_empty".into(),
        passed: !scenarios.is_empty(),
        detail: format!("{} scenarios loaded", scenarios.len()),
    });

    for scenario in &scenarios {
        let config = &scenario.config;
        let errors = validate_config(config);
        if !errors.is_empty() {
            let list: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            results.push(TestResult {
                name: format!("{}_config", scenario.name),
                passed: false,
                detail: list.join("; "),
            });
            continue;
        }

        let rules = config.rule_table();
        let initial = match build_state(config, &rules) {
            Ok(state) => state,
            Err(e) => {
                results.push(TestResult {
                    name: format!("{}_build", scenario.name),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let engine = SearchEngine::new(&rules, config.options.clone());
        let outcome = engine.search(initial.clone(), &config.goal, &config.pool);
        let metrics = TempleMetrics::from_state(&outcome.final_state, &rules, &config.goal);

        if verbose {
            println!(
                "  {}: found={} placements={} value={} iterations={} ({} ms)",
                scenario.name,
                outcome.found,
                outcome.actions.len(),
                metrics.total_value,
                outcome.stats.iterations,
                outcome.stats.elapsed_ms
            );
            print!("{}", outcome.final_state.render());
        }

        if let Some(expected) = scenario.expect_found {
            let mut detail = format!(
                "found={} expected={} ({})",
                outcome.found,
                expected,
                outcome.stats.stop_reason.name()
            );
            if !outcome.found {
                for hint in diagnose(config) {
                    detail.push_str("; ");
                    detail.push_str(&hint);
                }
            }
            results.push(TestResult {
                name: format!("{}_found", scenario.name),
                passed: outcome.found == expected,
                detail,
            });
        }

        if let Some(max) = scenario.max_actions {
            results.push(TestResult {
                name: format!("{}_length", scenario.name),
                passed: outcome.actions.len() <= max,
                detail: format!("{} placements (max {})", outcome.actions.len(), max),
            });
        }

        results.extend(check_outcome(
            &scenario.name,
            &initial,
            &outcome,
            &config.goal,
            &rules,
            &config.options,
        ));
    }

    results
}

// ── 2. Random architect sweep ───────────────────────────────────────────

fn random_architect(rng: &mut StdRng) -> Coord {
    loop {
        let c = Coord::new(rng.gen_range(1..=GRID_SIZE), rng.gen_range(1..=GRID_SIZE));
        if c != FOYER_POS && c != EXIT_POS {
            return c;
        }
    }
}

fn sweep_architects(seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Random architect sweep (seed {}) ---", seed);
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let rules = RoomRuleTable::standard();
    let options = SearchOptions::default();
    let goal = Goal::reach_architect();
    let pool = ResourcePool::unlimited();

    // Cells beside the Exit always run: there the Exit is already the
    // Architect's one neighbour.
    let mut architects = vec![Coord::new(5, 8), Coord::new(4, 9), Coord::new(6, 9)];
    architects.extend((0..12).map(|_| random_architect(&mut rng)));

    let mut total_ms = 0;
    for (i, architect) in architects.into_iter().enumerate() {
        let initial = match TempleState::create_empty(architect) {
            Ok(mut state) => {
                update_connectivity(&mut state, &rules);
                state
            }
            Err(e) => {
                results.push(TestResult {
                    name: format!("sweep_{}_create", i),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let engine = SearchEngine::new(&rules, options.clone());
        let outcome = engine.search(initial.clone(), &goal, &pool);
        total_ms += outcome.stats.elapsed_ms;
        let distance = FOYER_POS.manhattan(architect) as usize;
        // Beside the Exit the corridor may have to go round to the Exit's
        // far side.
        let bound = if architect.manhattan(EXIT_POS) == 1 { distance + 4 } else { distance };

        results.push(TestResult {
            name: format!("sweep_{}_reach_{}_{}", i, architect.x, architect.y),
            passed: outcome.found && outcome.actions.len() <= bound,
            detail: format!(
                "{} placements for distance {} (max {}), {} iterations",
                outcome.actions.len(),
                distance,
                bound,
                outcome.stats.iterations
            ),
        });
        results.extend(check_outcome(
            &format!("sweep_{}", i),
            &initial,
            &outcome,
            &goal,
            &rules,
            &options,
        ));
    }

    if verbose {
        println!("  sweep total search time: {} ms", total_ms);
    }
    results
}

// ── 3. Random placement walks ───────────────────────────────────────────

fn random_walks(seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Random placement walks ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let rules = RoomRuleTable::standard();
    let validator = ConstraintValidator::new(&rules);
    let pool = ResourcePool::unlimited();

    let mut placements = 0;
    let mut loops = 0;
    let mut overloaded = 0;
    let mut disconnected = 0;
    for _ in 0..20 {
        let architect = random_architect(&mut rng);
        let Ok(mut state) = TempleState::create_empty(architect) else {
            continue;
        };
        update_connectivity(&mut state, &rules);

        for _ in 0..60 {
            let actions = generate_actions(&state, &validator, &pool);
            if actions.is_empty() {
                break;
            }
            let action = actions[rng.gen_range(0..actions.len())];
            state.apply(&action);
            update_connectivity(&mut state, &rules);
            placements += 1;

            if has_loop(&state, &rules) {
                loops += 1;
            }
            if state.occupied_neighbors(architect).count() > validator.architect_max_neighbors() {
                overloaded += 1;
            }
            if !state.foyer_connected().contains(action.coord) {
                disconnected += 1;
            }
        }

        if verbose {
            let m = TempleMetrics::from_state(&state, &rules, &Goal::reach_architect());
            println!(
                "  walk architect={} rooms={} paths={} junctions={} value={}",
                architect, m.room_count, m.path_count, m.junctions, m.total_value
            );
        }
    }

    results.push(TestResult {
        name: "walk_no_loops".into(),
        passed: loops == 0,
        detail: format!("{} loops in {} placements", loops, placements),
    });
    results.push(TestResult {
        name: "walk_architect_limit".into(),
        passed: overloaded == 0,
        detail: format!("{} overloaded states", overloaded),
    });
    results.push(TestResult {
        name: "walk_every_placement_connected".into(),
        passed: disconnected == 0,
        detail: format!("{} disconnected placements", disconnected),
    });

    results
}
