//! evalg-run - run analysis algorithms over event files
//!
//! Exit codes: 0 on success, 1 on any usage or runtime failure, 2 when help
//! or version text was displayed.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use evalg_algo::runner::{check_threading, read_events, run_events, write_events};
use evalg_algo::{Algorithm, AlgorithmRegistry, AlgorithmSequence};
use evalg_common::logging::init_tracing;
use evalg_common::settings::RunSettings;
use evalg_common::ConcurrencyModel;
use tracing::info;

/// Command-line arguments for evalg-run
#[derive(Parser, Debug)]
#[command(name = "evalg-run")]
#[command(about = "Run per-event analysis algorithms over JSON-lines event files")]
#[command(version)]
struct Cli {
    /// Log level or filter directive (overrides EVALG_LOG and the settings file)
    #[arg(short, long, global = true)]
    log: Option<String>,

    /// Settings file
    #[arg(short, long, global = true, env = "EVALG_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered algorithms
    List,
    /// Run one algorithm, after its prerequisites, over an event file
    Algorithm(AlgorithmArgs),
}

#[derive(Args, Debug)]
struct AlgorithmArgs {
    /// Algorithm class name, e.g. clas12::ZVertexFilter
    name: String,

    /// Input events, one JSON bank list per line
    #[arg(short, long)]
    input: PathBuf,

    /// Output file for accepted events (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Algorithm to run before NAME; repeatable, runs in the given order
    #[arg(short, long = "prerequisite")]
    prerequisites: Vec<String>,

    /// Worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Concurrency model for run-dependent parameters
    #[arg(short = 'm', long)]
    concurrency_model: Option<ConcurrencyModel>,

    /// Override configuration directory
    #[arg(long)]
    config_dir: Option<String>,

    /// Override configuration file
    #[arg(long)]
    config_file: Option<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitCode::from(2),
                _ => ExitCode::from(1),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = RunSettings::load_or_default(cli.settings.as_deref()).context("Failed to load settings")?;
    init_tracing(&settings.resolve_log_level(cli.log.as_deref()))?;

    let registry = Arc::new(AlgorithmRegistry::with_builtins());
    match cli.command {
        Command::List => {
            for name in registry.names() {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Algorithm(args) => run_algorithm(&settings, registry, args),
    }
}

fn run_algorithm(settings: &RunSettings, registry: Arc<AlgorithmRegistry>, args: AlgorithmArgs) -> Result<()> {
    let threads = settings.resolve_threads(args.threads)?;
    let model = settings.resolve_concurrency_model(args.concurrency_model);

    let mut sequence = AlgorithmSequence::new(registry);
    for prerequisite in &args.prerequisites {
        sequence.add(prerequisite, None)?;
    }
    sequence.add(&args.name, None)?;
    sequence.set_concurrency_model(model);
    for dir in &settings.config_dirs {
        sequence.add_search_directory(dir);
    }
    if let Some(dir) = &args.config_dir {
        sequence.set_config_directory(dir);
    }
    if let Some(file) = &args.config_file {
        sequence.set_config_file(file);
    }
    sequence.print_sequence();
    check_threading(&sequence, threads)?;

    let input = File::open(&args.input).with_context(|| format!("Failed to open {}", args.input.display()))?;
    let events = read_events(BufReader::new(input))?;
    let Some(first) = events.first() else {
        info!("no events in {}", args.input.display());
        return Ok(());
    };

    sequence.start(first)?;
    let (accepted, summary) = run_events(&sequence, events, threads)?;
    sequence.stop()?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            write_events(BufWriter::new(file), &accepted)?;
        }
        None => write_events(BufWriter::new(io::stdout().lock()), &accepted)?,
    }
    info!(
        events = summary.events,
        accepted = summary.accepted,
        threads = summary.threads,
        "done"
    );
    Ok(())
}
