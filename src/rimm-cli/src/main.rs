//! `simulate`: the CLI front-end over the rimm scheduler simulator core.
//! A minimal wrapper: parses flags, opens the workload stream and log
//! sink, and hands both to `rimm_sim::Simulation`.

use std::fs::File;
use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};

use rimm_core::{Vars, PACKER_NAMES, SPLITTER_NAMES};
use rimm_log::{JsonlSink, LogSink, StdoutSink};
use rimm_sim::Simulation;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("rimm_cli=info")).init();

    if let Err(e) = main_inner() {
        log::error!("Command failed.\n{e:?}");
        std::process::exit(1);
    }
}

fn main_inner() -> anyhow::Result<()> {
    let opt = Opt::parse();
    match opt.command {
        Command::Simulate(args) => run_simulate(args),
    }
}

/// Offline discrete-event simulator for a periodic integrity-check
/// scheduler.
#[derive(Parser)]
#[command(name = "rimm-cli", version)]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workload through the simulator.
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct SimulateArgs {
    /// Path to the workload JSON stream, or `-` for standard input.
    workload: String,

    /// Write the event log as JSON-lines to PATH instead of stdout.
    #[arg(long = "sqllog", value_name = "PATH")]
    sqllog: Option<PathBuf>,

    /// Read the workload line-by-line rather than in fixed-size chunks,
    /// and treat a schema violation as a warning instead of fatal.
    #[arg(long)]
    interactive: bool,

    /// Schema-validate every workload event before dispatching it.
    #[arg(long)]
    validate: bool,

    /// Print every event as it's recorded.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Initial splitter granularity, in microseconds (`taskgran`).
    #[arg(long = "task-granularity", value_name = "MICROSECONDS")]
    task_granularity: Option<u64>,

    /// Initial windows per simulated second (`smmpersecond`).
    #[arg(long = "smm-per-second")]
    smm_per_second: Option<u64>,

    /// Initial fixed per-window overhead, in microseconds (`smmoverhead`).
    #[arg(long = "smm-overhead")]
    smm_overhead: Option<u64>,

    /// Initial window budget, in microseconds (`binsize`).
    #[arg(long = "bin-size")]
    bin_size: Option<u64>,

    /// Initial number of CPUs (`cpus`).
    #[arg(long)]
    cpus: Option<u32>,

    /// Initial bin packer, by registry name (`binpacker`).
    #[arg(long)]
    binpacker: Option<String>,

    /// Initial check splitter, by registry name (`checksplitter`).
    #[arg(long)]
    checksplitter: Option<String>,
}

fn run_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let vars = resolve_vars(&args)?;
    let run_args = std::env::args().collect::<Vec<_>>().join(" ");
    let reader = open_workload(&args.workload)?;

    match &args.sqllog {
        Some(path) => {
            let sink = JsonlSink::create(path, args.verbose)
                .with_context(|| format!("creating sqllog sink at {}", path.display()))?;
            simulate_with(vars, sink, reader, &args, &run_args)
        }
        None => simulate_with(vars, StdoutSink::new(args.verbose), reader, &args, &run_args),
    }
}

fn simulate_with<L: LogSink>(
    vars: Vars,
    sink: L,
    reader: Box<dyn BufRead>,
    args: &SimulateArgs,
    run_args: &str,
) -> anyhow::Result<()> {
    let mut sim = Simulation::new(vars, sink, reader, args.interactive, args.validate, run_args);
    sim.run().context("running simulation")?;
    Ok(())
}

fn open_workload(path: &str) -> anyhow::Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(io::BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("opening workload file `{path}`"))?;
    Ok(Box::new(io::BufReader::new(file)))
}

fn resolve_vars(args: &SimulateArgs) -> anyhow::Result<Vars> {
    let mut vars = Vars::default();
    if let Some(v) = args.task_granularity {
        vars.taskgran = v;
    }
    if let Some(v) = args.smm_per_second {
        vars.smmpersecond = v;
    }
    if let Some(v) = args.smm_overhead {
        vars.smmoverhead = v;
    }
    if let Some(v) = args.bin_size {
        vars.binsize = v;
    }
    if let Some(v) = args.cpus {
        vars.cpus = v;
    }
    if let Some(name) = &args.binpacker {
        if !PACKER_NAMES.contains(&name.as_str()) {
            bail!("unknown bin packer `{name}`");
        }
        vars.binpacker = name.clone();
    }
    if let Some(name) = &args.checksplitter {
        if !SPLITTER_NAMES.contains(&name.as_str()) {
            bail!("unknown check splitter `{name}`");
        }
        vars.checksplitter = name.clone();
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(workload: PathBuf, sqllog: Option<PathBuf>) -> SimulateArgs {
        SimulateArgs {
            workload: workload.to_string_lossy().into_owned(),
            sqllog,
            interactive: false,
            validate: true,
            verbose: false,
            task_granularity: None,
            smm_per_second: None,
            smm_overhead: None,
            bin_size: None,
            cpus: None,
            binpacker: None,
            checksplitter: None,
        }
    }

    #[test]
    fn simulate_runs_a_workload_file_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let workload_path = dir.path().join("workload.json");
        let mut f = File::create(&workload_path).unwrap();
        write!(
            f,
            r#"{{"action":"newcheck","time":0,"checks":[{{"group":"G","name":"C","cost":50,"priority":5}}]}}{{"action":"endsim","time":10}}"#
        )
        .unwrap();
        drop(f);

        let log_path = dir.path().join("out.jsonl");
        let result = run_simulate(args(workload_path, Some(log_path.clone())));
        assert!(result.is_ok(), "{result:?}");
        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.lines().count() > 0);
    }

    #[test]
    fn simulate_rejects_a_missing_workload_file() {
        let result = run_simulate(args(PathBuf::from("/no/such/workload.json"), None));
        assert!(result.is_err());
    }

    #[test]
    fn resolve_vars_rejects_an_unknown_binpacker() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path().join("unused.json"), None);
        a.binpacker = Some("NotARealPacker".to_string());
        assert!(resolve_vars(&a).is_err());
    }

    /// A schema-invalid action (`time: -1`) is rejected by the validator
    /// in non-interactive mode and the command fails without ever
    /// accepting the workload.
    #[test]
    fn simulate_rejects_a_schema_invalid_workload_non_interactively() {
        let dir = tempfile::tempdir().unwrap();
        let workload_path = dir.path().join("bad.json");
        let mut f = File::create(&workload_path).unwrap();
        write!(f, r#"{{"action":"endsim","time":-1}}"#).unwrap();
        drop(f);

        let result = run_simulate(args(workload_path, None));
        assert!(result.is_err());
    }

    #[test]
    fn resolve_vars_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path().join("unused.json"), None);
        a.bin_size = Some(250);
        a.binpacker = Some("LeastRecentBin".to_string());
        let vars = resolve_vars(&a).unwrap();
        assert_eq!(vars.binsize, 250);
        assert_eq!(vars.binpacker, "LeastRecentBin");
    }
}
