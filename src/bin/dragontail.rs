use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dragontail_fetch::app::{App, RunOptions};
use dragontail_fetch::config::ConfigLoader;
use dragontail_fetch::ddragon::DdragonHttpClient;
use dragontail_fetch::error::DragontailError;
use dragontail_fetch::output::{JsonOutput, OutputMode};
use dragontail_fetch::store::Store;
use dragontail_fetch::tui::Tui;

#[derive(Parser)]
#[command(name = "dragontail")]
#[command(about = "Fetch the latest DDragon dragontail archive and derive champion data and tiles")]
#[command(version, author)]
struct Cli {
    /// Project root holding version.txt, cache/ and data/
    #[arg(long)]
    root: Option<Utf8PathBuf>,

    /// JSON config file (defaults to dragontail.json in the root)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Size of the tile copy pool
    #[arg(long)]
    workers: Option<usize>,

    /// Download and extract even if the cache says otherwise
    #[arg(long)]
    force: bool,

    /// Resolve the version and report what would run
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DragontailError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DragontailError) -> u8 {
    match error.root() {
        DragontailError::MissingInput(_)
        | DragontailError::MalformedInput { .. }
        | DragontailError::ConfigRead(_)
        | DragontailError::ConfigParse(_)
        | DragontailError::InvalidConfig(_) => 2,
        DragontailError::Upstream { .. }
        | DragontailError::UpstreamStatus { .. }
        | DragontailError::IncompleteDownload { .. }
        | DragontailError::InvalidVersion(_)
        | DragontailError::EmptyResult(_) => 3,
        DragontailError::PathTraversal { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive || !std::io::stdout().is_terminal() {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    // The dashboard owns the terminal, so it only gets log lines on request.
    let filter = match output_mode {
        OutputMode::Interactive => EnvFilter::from_default_env(),
        OutputMode::NonInteractive => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let store = match cli.root {
        Some(root) => Store::new_with_root(root),
        None => Store::new()?,
    };

    let mut config = ConfigLoader::resolve(
        cli.config.as_deref(),
        store.project_root().as_std_path(),
    )?;
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(DragontailError::InvalidConfig(
                "--workers must be at least 1".to_string(),
            )
            .into());
        }
        config.copy_workers = workers;
    }

    let client = DdragonHttpClient::new(&config)?;
    let app = App::new(store, config, client);
    let options = RunOptions {
        force: cli.force,
        dry_run: cli.dry_run,
    };

    match output_mode {
        OutputMode::Interactive => {
            let mut tui = Tui::new();
            let report = tui.run(move |sink| app.run(&options, sink))?;
            tui.finish(&report)
        }
        OutputMode::NonInteractive => {
            let report = app.run(&options, &JsonOutput)?;
            JsonOutput::print_report(&report).into_diagnostic()
        }
    }
}
