//! Export-step binary: turn a solution JSON into policy table files.
//!
//! Usage:
//!   cargo run --release --bin export_policy -- [OPTIONS]
//!
//! Options:
//!   --solution <FILE>     Solver solution JSON
//!   --out <DIR>           Output directory for policy tables
//!   --compress            Write gzip-compressed tables
//!   --debug-jsonl <FILE>  Emit a JSONL sample of postflop records
//!   --reuse               Skip files that already exist

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use policy_solver::export::{export_from_solution, ExportOptions};
use policy_solver::tree::load_solution;

struct CliArgs {
    solution: PathBuf,
    out: PathBuf,
    compress: bool,
    debug_jsonl: Option<PathBuf>,
    reuse: bool,
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
    let mut solution: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut compress = false;
    let mut debug_jsonl: Option<PathBuf> = None;
    let mut reuse = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--solution" => solution = Some(take_value(args, &mut i, "--solution")?.into()),
            "--out" => out = Some(take_value(args, &mut i, "--out")?.into()),
            "--compress" => compress = true,
            "--debug-jsonl" => {
                debug_jsonl = Some(take_value(args, &mut i, "--debug-jsonl")?.into())
            }
            "--reuse" => reuse = true,
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
        i += 1;
    }

    Ok(CliArgs {
        solution: solution.ok_or("--solution is required")?,
        out: out.ok_or("--out is required")?,
        compress,
        debug_jsonl,
        reuse,
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

    let solution = load_solution(&cli.solution)?;
    let options = ExportOptions {
        out_dir: cli.out.clone(),
        compress: cli.compress,
        reuse: cli.reuse,
        debug_jsonl: cli.debug_jsonl.clone(),
    };
    let summary = export_from_solution(&solution, Some(&cli.solution), &options)?;

    for file in &summary.files {
        let status = if file.reused { "reused" } else { "wrote" };
        println!(
            "{} {} ({} record(s)) at {}",
            status,
            file.street,
            file.node_count,
            file.path.display()
        );
    }
    println!("Export finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn print_help() {
    println!("Export a policy solution into street-scoped table files");
    println!();
    println!("Usage: export_policy [OPTIONS]");
    println!();
    println!("Required:");
    println!("  --solution <FILE>     Path to solver solution JSON");
    println!("  --out <DIR>           Output directory for policy tables");
    println!();
    println!("Options:");
    println!("  --compress            Write gzip-compressed tables (.json.gz)");
    println!("  --debug-jsonl <FILE>  Emit a JSONL sample of postflop records");
    println!("  --reuse               Skip files that already exist");
    println!("  -h, --help            Show this help");
    println!();
    println!("Examples:");
    println!("  export_policy --solution solution.json --out artifacts/policies");
    println!("  export_policy --solution solution.json --out artifacts/policies \\");
    println!("                --compress --debug-jsonl artifacts/sample.jsonl");
}
