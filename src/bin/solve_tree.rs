//! Solve-step binary: turn tree artifacts into a solution JSON.
//!
//! Usage:
//!   cargo run --release --bin solve_tree -- [OPTIONS]
//!
//! Options:
//!   --tree <FILE>            Tree JSON artifact
//!   --buckets <PATH>         Bucket definition (JSON file or directory)
//!   --transitions <PATH>     Transition data (JSON file or directory)
//!   --leaf-ev <FILE>         Leaf EV JSON mapping
//!   --solver <NAME>          LP backend: auto/highs/linprog (default: auto)
//!   --small-engine <MODE>    Small-matrix engine: auto/on/off (default: auto)
//!   --small-max-dim <N>      Max dimension for the small engine (default: 5)
//!   --seed <N>               Seed recorded in solution metadata
//!   --out <FILE>             Output JSON path
//!   --log-meta               Emit progress metadata to stderr

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use indicatif::ProgressBar;

use policy_solver::solver::{BackendPreference, EngineMode, SolveOptions};
use policy_solver::tree::{
    load_leaf_ev, load_mapping, load_tree, solve_tree, write_solution,
};

struct CliArgs {
    tree: PathBuf,
    buckets: PathBuf,
    transitions: PathBuf,
    leaf_ev: PathBuf,
    solver: String,
    small_engine: String,
    small_max_dim: usize,
    seed: Option<u64>,
    out: PathBuf,
    log_meta: bool,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!();
            print_help();
            process::exit(1);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut tree: Option<PathBuf> = None;
    let mut buckets: Option<PathBuf> = None;
    let mut transitions: Option<PathBuf> = None;
    let mut leaf_ev: Option<PathBuf> = None;
    let mut solver = "auto".to_string();
    let mut small_engine = "auto".to_string();
    let mut small_max_dim: usize = 5;
    let mut seed: Option<u64> = None;
    let mut out: Option<PathBuf> = None;
    let mut log_meta = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tree" => tree = Some(take_value(args, &mut i, "--tree")?.into()),
            "--buckets" => buckets = Some(take_value(args, &mut i, "--buckets")?.into()),
            "--transitions" => {
                transitions = Some(take_value(args, &mut i, "--transitions")?.into())
            }
            "--leaf-ev" | "--leaf_ev" => {
                leaf_ev = Some(take_value(args, &mut i, "--leaf-ev")?.into())
            }
            "--solver" => solver = take_value(args, &mut i, "--solver")?,
            "--small-engine" => small_engine = take_value(args, &mut i, "--small-engine")?,
            "--small-max-dim" => {
                let raw = take_value(args, &mut i, "--small-max-dim")?;
                small_max_dim = raw
                    .parse()
                    .map_err(|_| format!("--small-max-dim expects an integer, got '{}'", raw))?;
            }
            "--seed" => {
                let raw = take_value(args, &mut i, "--seed")?;
                seed = Some(
                    raw.parse()
                        .map_err(|_| format!("--seed expects an integer, got '{}'", raw))?,
                );
            }
            "--out" => out = Some(take_value(args, &mut i, "--out")?.into()),
            "--log-meta" => log_meta = true,
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
        i += 1;
    }

    Ok(CliArgs {
        tree: tree.ok_or("--tree is required")?,
        buckets: buckets.ok_or("--buckets is required")?,
        transitions: transitions.ok_or("--transitions is required")?,
        leaf_ev: leaf_ev.ok_or("--leaf-ev is required")?,
        solver,
        small_engine,
        small_max_dim,
        seed,
        out: out.ok_or("--out is required")?,
        log_meta,
    })
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} expects a value", flag))
}

fn run(cli: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let backend: BackendPreference = cli.solver.parse()?;
    let engine_mode: EngineMode = cli.small_engine.parse()?;
    let mut options = SolveOptions::new()
        .with_backend(backend)
        .with_engine_mode(engine_mode)
        .with_small_max_dim(cli.small_max_dim);
    if let Some(seed) = cli.seed {
        options = options.with_seed(seed);
    }

    if cli.log_meta {
        eprintln!("[solve_tree] Loading tree from {}", cli.tree.display());
    }
    let (tree, tree_raw) = load_tree(&cli.tree)?;

    if cli.log_meta {
        eprintln!("[solve_tree] Loading buckets from {}", cli.buckets.display());
    }
    let buckets = load_mapping(&cli.buckets, "buckets")?;

    if cli.log_meta {
        eprintln!(
            "[solve_tree] Loading transitions from {}",
            cli.transitions.display()
        );
    }
    let transitions = load_mapping(&cli.transitions, "transitions")?;

    if cli.log_meta {
        eprintln!("[solve_tree] Loading leaf EV from {}", cli.leaf_ev.display());
    }
    let leaf_ev = load_leaf_ev(&cli.leaf_ev)?;

    if cli.log_meta {
        eprintln!(
            "[solve_tree] Solving with backend={} small-engine={} seed={:?}",
            cli.solver, cli.small_engine, cli.seed
        );
    }

    let progress = ProgressBar::new_spinner();
    progress.set_message("solving decision nodes");
    let solution = solve_tree(
        &tree,
        &tree_raw,
        &buckets,
        &transitions,
        &leaf_ev,
        &options,
        |_node_id| progress.inc(1),
    )?;
    progress.finish_and_clear();

    write_solution(Path::new(&cli.out), &solution)?;

    let elapsed = start.elapsed().as_secs_f64();
    println!("Solved {} policy node(s) in {:.2}s", solution.nodes.len(), elapsed);
    println!("Backend: {}", solution.backend);
    println!("Root value: {:.6}", solution.value);
    println!("Tree hash: {}", solution.meta.tree_hash);
    println!("Solution written to {}", cli.out.display());
    if cli.log_meta {
        eprintln!("[solve_tree] Completed in {:.2}s", elapsed);
    }
    Ok(())
}

fn print_help() {
    println!("Solve tree artifacts into a policy solution");
    println!();
    println!("Usage: solve_tree [OPTIONS]");
    println!();
    println!("Required:");
    println!("  --tree <FILE>            Tree JSON artifact");
    println!("  --buckets <PATH>         Bucket definition (JSON file or directory)");
    println!("  --transitions <PATH>     Transition data (JSON file or directory)");
    println!("  --leaf-ev <FILE>         Leaf EV JSON mapping");
    println!("  --out <FILE>             Output JSON path for solver results");
    println!();
    println!("Options:");
    println!("  --solver <NAME>          LP backend: auto/highs/linprog (default: auto)");
    println!("  --small-engine <MODE>    Small-matrix engine: auto/on/off (default: auto)");
    println!("  --small-max-dim <N>      Max matrix dimension for the small engine (default: 5)");
    println!("  --seed <N>               Seed recorded in solution metadata");
    println!("  --log-meta               Emit progress metadata to stderr");
    println!("  -h, --help               Show this help");
    println!();
    println!("Examples:");
    println!("  # Solve with the small engine and portable LP fallback");
    println!("  solve_tree --tree tree.json --buckets buckets.json \\");
    println!("             --transitions transitions.json --leaf-ev leaf_ev.json \\");
    println!("             --out solution.json");
    println!();
    println!("  # Force the native backend and a fixed seed");
    println!("  solve_tree --tree tree.json --buckets buckets/ --transitions trans/ \\");
    println!("             --leaf-ev leaf_ev.json --solver highs --seed 42 --out solution.json");
}
