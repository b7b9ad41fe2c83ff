//! Command-line front end for the slideqc pipeline orchestrator.
//!
//! Exit codes: 0 on success (including completed-with-warnings), 1 for
//! usage, environment, or workspace errors, 2 when a required stage fails,
//! 130 when the run is cancelled with Ctrl-C.

use clap::{ArgAction, Args, Parser, Subcommand};
use slideqc::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

#[derive(Parser)]
#[command(name = "slideqc", version, about = "Whole-slide-image quality-control pipeline")]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the QC pipeline on one slide
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the input slide (.svs, .ndpi, .tiff, .tif, .mrxs)
    slide: PathBuf,

    /// Root directory under which the run directory is created
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// QC model magnification preset
    #[arg(long, default_value = "10x", value_parser = parse_magnification)]
    magnification: ModelResolution,

    /// Emit GeoJSON geometry annotations from the QC stage
    #[arg(long)]
    geojson: bool,

    /// Skip report generation
    #[arg(long)]
    skip_report: bool,

    /// Skip overlay generation
    #[arg(long)]
    skip_overlay: bool,

    /// Per-stage timeout in seconds
    #[arg(long)]
    stage_timeout: Option<u64>,
}

fn parse_magnification(s: &str) -> Result<ModelResolution, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    std::process::exit(run_main().await);
}

async fn run_main() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = i32::from(err.use_stderr());
            let _ = err.print();
            return code;
        }
    };

    if let Err(err) = init_logging(cli.verbose) {
        eprintln!("{err:#}");
        return 1;
    }

    match cli.command {
        Command::Run(args) => run_pipeline(args).await,
    }
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialize logging: {err}"))
}

async fn run_pipeline(args: RunArgs) -> i32 {
    let mut options = RunOptions::new(args.slide).with_resolution(args.magnification);
    if let Some(dir) = args.output_dir {
        options = options.with_output_root(dir);
    }
    if args.geojson {
        options = options.with_geojson();
    }
    if args.skip_report {
        options = options.skip_report();
    }
    if args.skip_overlay {
        options = options.skip_overlay();
    }
    if let Some(secs) = args.stage_timeout {
        options = options.with_stage_timeout(Duration::from_secs(secs));
    }

    let bus = Arc::new(EventBus::new());
    let forwarder = bus.attach(Arc::new(LoggingEventSink));

    let controller = match PipelineController::new(options, bus.clone()) {
        Ok(controller) => controller,
        Err(err) => {
            error!("{err}");
            return 1;
        }
    };

    let handle = controller.spawn();
    let token = handle.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel("interrupted by Ctrl-C");
        }
    });

    let result = handle.wait().await;
    bus.close();
    let _ = forwarder.await;

    match result {
        Ok(run) => {
            print_summary(&run);
            match run.status {
                RunStatus::Failed => 2,
                RunStatus::Cancelled => 130,
                _ => 0,
            }
        }
        Err(err) => {
            error!("{err}");
            1
        }
    }
}

fn print_summary(run: &PipelineRun) {
    println!("run {}: {}", run.run_id, run.status);
    for result in &run.stage_results {
        let exit = result
            .exit_code
            .map_or_else(|| "-".to_string(), |code| code.to_string());
        println!("  {:<14} {:<10} exit={exit}", result.stage, result.outcome.to_string());
        for line in &result.stderr_tail {
            println!("    ! {line}");
        }
    }
    if run.status.is_success() {
        println!("output directory: {}", run.output_dir.display());
    }
}
