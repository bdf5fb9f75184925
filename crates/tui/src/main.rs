mod renderer;
mod session;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use flowshop_core::config::SolverConfig;
use flowshop_core::supervisor::RunOutcome;
use flowshop_core::views::{self, gantt::ROW_HEIGHT, time_axis::AXIS_HEIGHT};
use flowshop_core::{LayoutModel, RunUpdate, Supervisor, svg, validate_instance};
use flowshop_protocol::Viewport;
use tracing_subscriber::{EnvFilter, fmt};

use session::{Launch, LiveSession, describe_outcome};

const SVG_WIDTH: f64 = 1200.0;

/// Live Gantt view of a flow-shop solver run.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Instance file handed to the solver
    data: PathBuf,

    /// Algorithm name from the configuration
    #[arg(short, long, default_value = "NEH")]
    algorithm: String,

    /// Override an algorithm parameter, e.g. `--param Iterations=20000`
    #[arg(short, long = "param", value_name = "LABEL=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Solver executable (overrides the configuration)
    #[arg(long)]
    solver: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write diagnostics to this file (filtered by RUST_LOG)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Append every raw solver line to this file as JSON
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Export the last layout as SVG when the run ends
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Report progress on stderr instead of drawing in the terminal
    #[arg(long)]
    headless: bool,

    /// Stop reading at the first END instead of following later phases
    #[arg(long)]
    stop_at_end: bool,

    /// Start heavy runs without asking
    #[arg(short, long)]
    yes: bool,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(label, value)| (label.trim().to_string(), value.trim().to_string()))
        .filter(|(label, _)| !label.is_empty())
        .ok_or_else(|| format!("expected LABEL=VALUE, got {raw:?}"))
}

fn init_logging(log: Option<&Path>, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        // The terminal belongs to the chart unless running headless.
        None if headless => fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init(),
        None => fmt().with_env_filter(filter).with_writer(io::sink).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.log.as_deref(), args.headless)?;

    let mut config = match &args.config {
        Some(path) => SolverConfig::load(path)?,
        None => SolverConfig::default(),
    };
    if let Some(solver) = &args.solver {
        config.solver.clone_from(solver);
    }
    if args.stop_at_end {
        config.follow_after_end = false;
    }

    let summary = match validate_instance(&args.data) {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::from(2));
        }
    };
    tracing::info!(jobs = summary.jobs, machines = summary.machines, "instance validated");

    let schema = config.algorithm(&args.algorithm)?;
    let overrides: HashMap<String, String> = args.params.iter().cloned().collect();
    let warnings = summary.workload_warnings(&schema.phases(&overrides)?);
    if !warnings.is_empty() {
        for warning in &warnings {
            eprintln!("- {warning}");
        }
        if !args.yes {
            eprintln!("This run may take a long time; pass --yes to start it anyway.");
            return Ok(ExitCode::from(3));
        }
    }

    let launch = Launch {
        solver: config.solver.display().to_string(),
        args: schema.command_args(&args.data, &overrides)?,
        transcript: args.transcript.clone(),
    };
    tracing::info!(solver = %launch.solver, args = ?launch.args, "launching");

    let mut session = LiveSession::start(Supervisor::new(config.supervisor()), launch)?;
    if args.headless {
        run_headless(&mut session);
    } else {
        renderer::run_tui(&mut session)?;
    }
    session.shutdown();

    if let Some(path) = &args.svg {
        export_svg(&session.state.layout, path)?;
    }

    let succeeded = session.state.outcome.as_ref().is_some_and(RunOutcome::success);
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_headless(session: &mut LiveSession) {
    while let Some(update) = session.recv() {
        match &update {
            RunUpdate::Layout(model) => {
                let iteration = model
                    .iteration
                    .map_or_else(|| "-".to_string(), |it| it.to_string());
                eprintln!(
                    "frame {iteration}: {} machines, {} operations, makespan {}",
                    model.rows.len(),
                    model.bar_count(),
                    model.max_end
                );
            }
            RunUpdate::Best(best) => eprintln!(
                "{} result: Cmax {}",
                best.variant.as_deref().unwrap_or("best"),
                best.cmax
            ),
            RunUpdate::Warning(message) => eprintln!("solver error: {message}"),
            RunUpdate::DecodeFailed { line, error } => {
                eprintln!("skipped malformed line ({error}): {line}");
            }
            RunUpdate::Finished(outcome) => eprintln!("run {}", describe_outcome(outcome)),
            RunUpdate::Progress(_) | RunUpdate::Choice(_) => {}
        }
        let finished = matches!(update, RunUpdate::Finished(_));
        session.state.apply(update);
        if finished {
            break;
        }
    }
}

fn export_svg(model: &LayoutModel, path: &Path) -> Result<()> {
    let height = AXIS_HEIGHT + model.rows.len() as f64 * ROW_HEIGHT;
    let viewport = Viewport::new(SVG_WIDTH, height);
    let commands = views::render_chart(model, &viewport);
    fs::write(path, svg::render_svg(&commands, SVG_WIDTH, height, true))
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "layout exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(
            parse_param("T start = 90.5").unwrap(),
            ("T start".to_string(), "90.5".to_string())
        );
        assert!(parse_param("Iterations").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn cli_accepts_repeated_params() {
        let args = Args::try_parse_from([
            "flowshop-live",
            "data.txt",
            "--algorithm",
            "Simulated Annealing",
            "--param",
            "Iterations=100",
            "-p",
            "Cooling=0.9",
            "--headless",
        ])
        .unwrap();
        assert_eq!(args.params.len(), 2);
        assert!(args.headless);
        assert_eq!(args.data, PathBuf::from("data.txt"));
    }
}
