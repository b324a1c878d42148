use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use strutture::app::{App, ProgressEvent, ProgressSink, SyncOptions};
use strutture::error::StruttureError;
use strutture::fetch::HttpDatasetClient;
use strutture::filter::{ChoiceRank, EventType, FilterSpec};
use strutture::output::{JsonOutput, OutputMode};
use strutture::sources::PointerHttpClient;
use strutture::store::DatasetStore;
use strutture::tui;

#[derive(Parser)]
#[command(name = "strutture")]
#[command(about = "Archivio test strutture sci di fondo: sync and query")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download or refresh the local dataset")]
    Sync(SyncArgs),
    #[command(about = "Filter and display the dataset (default)")]
    Show(ShowArgs),
}

#[derive(Args, Clone, Default)]
struct SyncArgs {
    #[arg(long)]
    force: bool,
}

#[derive(Args, Clone, Default)]
struct ShowArgs {
    #[arg(long)]
    location: Option<String>,

    #[arg(long, value_enum)]
    event: Option<EventType>,

    #[arg(long)]
    weather: Option<String>,

    #[arg(long)]
    air_temp: Option<String>,

    #[arg(long)]
    snow_temp: Option<String>,

    #[arg(long)]
    snow_type: Option<String>,

    #[arg(long)]
    humidity: Option<String>,

    #[arg(long, value_enum)]
    choice: Option<ChoiceRank>,
}

impl ShowArgs {
    fn into_spec(self) -> FilterSpec {
        FilterSpec {
            location: self.location,
            event_type: self.event,
            weather: self.weather,
            air_temp: self.air_temp,
            snow_temp: self.snow_temp,
            snow_type: self.snow_type,
            humidity: self.humidity,
            choice: self.choice,
        }
    }
}

/// Progress for interactive runs goes to stderr so stdout stays clean.
struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        eprintln!("{}", event.message);
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<StruttureError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &StruttureError) -> u8 {
    match error {
        StruttureError::Workbook(_) | StruttureError::MissingSheet { .. } => 2,
        StruttureError::Http(_)
        | StruttureError::Status { .. }
        | StruttureError::FetchExhausted { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let store = DatasetStore::new()?;

    match cli.command {
        Some(Commands::Sync(args)) => run_sync(args, store, output_mode),
        Some(Commands::Show(args)) => run_show(args, store, output_mode),
        None => run_show(ShowArgs::default(), store, output_mode),
    }
}

fn build_app(store: DatasetStore) -> miette::Result<App<PointerHttpClient, HttpDatasetClient>> {
    let pointers = PointerHttpClient::new()?;
    let datasets = HttpDatasetClient::new()?;
    Ok(App::new(store, pointers, datasets))
}

fn run_sync(args: SyncArgs, store: DatasetStore, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(store)?;
    let options = SyncOptions { force: args.force };

    match output_mode {
        OutputMode::Interactive => {
            let result = app.sync(options, &StderrProgress)?;
            eprintln!("{}: {} -> {}", result.action, result.url, result.dataset_path);
            Ok(())
        }
        OutputMode::NonInteractive => {
            let result = app.sync(options, &JsonOutput)?;
            JsonOutput::print_sync(&result).into_diagnostic()
        }
    }
}

fn run_show(args: ShowArgs, store: DatasetStore, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(store)?;
    let spec = args.into_spec();

    match output_mode {
        OutputMode::Interactive => {
            app.sync(SyncOptions::default(), &StderrProgress)?;
            let result = app.query(&spec, &StderrProgress)?;
            tui::show_results(&result)
        }
        OutputMode::NonInteractive => {
            app.sync(SyncOptions::default(), &JsonOutput)?;
            let result = app.query(&spec, &JsonOutput)?;
            JsonOutput::print_query(&result).into_diagnostic()
        }
    }
}
