use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use clb_exporter::app::{App, ClearResult, ExportResult, ImportResult, ProgressSink};
use clb_exporter::checklist::ChecklistHttpClient;
use clb_exporter::config::{ConfigLoader, RunConfig};
use clb_exporter::error::ExportError;
use clb_exporter::import::SqliteCliImporter;
use clb_exporter::output::{ConsoleProgress, JsonOutput, OutputMode};
use clb_exporter::store::FsStore;

#[derive(Parser)]
#[command(name = "clb-export")]
#[command(about = "Export a ChecklistBank release into name usage, dataset and reference tables")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Crawl, resolve, write and import (default)")]
    Export(ExportArgs),
    #[command(about = "Manage the replay cache")]
    Cache(CacheArgs),
}

#[derive(Args, Clone, Default)]
struct ExportArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    page_size: Option<u64>,

    #[arg(long, help = "Record responses without replaying earlier ones")]
    no_cache: bool,

    #[arg(long, help = "Stop after writing the tables")]
    no_import: bool,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Subcommand)]
enum CacheCommand {
    #[command(about = "Delete recorded responses of the configured run")]
    Clear {
        #[arg(long)]
        config: Option<String>,

        #[arg(long)]
        cache_dir: Option<Utf8PathBuf>,
    },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ExportError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ExportError) -> u8 {
    match error {
        ExportError::Auth { .. } | ExportError::AuthHttp(_) => 2,
        ExportError::Http { .. } | ExportError::Status { .. } => 3,
        ExportError::CountMismatch { .. } => 4,
        ExportError::MalformedRecord { .. }
        | ExportError::MalformedResponse { .. }
        | ExportError::UnknownDataset(_) => 5,
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

    match cli.command {
        Some(Commands::Export(args)) => run_export(args, output_mode),
        Some(Commands::Cache(CacheArgs {
            command: CacheCommand::Clear { config, cache_dir },
        })) => run_clear(config, cache_dir, output_mode),
        None => run_export(ExportArgs::default(), output_mode),
    }
}

fn load_config(path: Option<&str>, cache_dir: Option<Utf8PathBuf>) -> Result<RunConfig, ExportError> {
    let mut config = ConfigLoader::resolve(path)?;
    if let Some(cache_dir) = cache_dir {
        config.cache_root = cache_dir;
    }
    Ok(config)
}

fn run_export(args: ExportArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut config = load_config(args.config.as_deref(), args.cache_dir)?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(page_size) = args.page_size {
        if page_size == 0 {
            return Err(ExportError::InvalidConfig("page size must be at least 1".to_string()).into());
        }
        config.page_size = page_size;
    }

    let mut store = FsStore::new(&config.cache_root, &config.run_tag());
    if args.no_cache {
        store = store.without_replay();
    }

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &ConsoleProgress,
        OutputMode::NonInteractive => &JsonOutput,
    };
    sink.event(clb_exporter::app::ProgressEvent {
        message: format!("phase=Login; {}", config.api_base),
        elapsed: None,
    });
    let client = ChecklistHttpClient::login(&config.api_base, &config.credentials)?;

    let app = App::new(config, client, store);
    let result = app.export(sink)?;
    let import = if args.no_import {
        None
    } else {
        Some(app.import(&SqliteCliImporter::new(), &result, sink)?)
    };

    match output_mode {
        OutputMode::Interactive => print_export_summary(&result, import.as_ref()),
        OutputMode::NonInteractive => {
            JsonOutput::print_export(&result, import.as_ref()).into_diagnostic()?
        }
    }
    Ok(())
}

fn run_clear(
    config: Option<String>,
    cache_dir: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let config = load_config(config.as_deref(), cache_dir)?;
    let store = FsStore::new(&config.cache_root, &config.run_tag());
    let result = ClearResult {
        cache_dir: store.root().to_string(),
        cleared: store.clear()?,
    };
    match output_mode {
        OutputMode::Interactive => {
            if result.cleared {
                println!("cleared {}", result.cache_dir);
            } else {
                println!("nothing cached at {}", result.cache_dir);
            }
        }
        OutputMode::NonInteractive => JsonOutput::print_clear(&result).into_diagnostic()?,
    }
    Ok(())
}

fn print_export_summary(result: &ExportResult, import: Option<&ImportResult>) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}{} export summary{reset}", result.run_tag);
    println!("{green}name usages: {}{reset}", result.usages);
    println!("{green}datasets:    {}{reset}", result.datasets);
    println!("{green}references:  {}{reset}", result.references);
    println!("   {}", result.tables.usages);
    println!("   {}", result.tables.datasets);
    println!("   {}", result.tables.references);
    if let Some(import) = import {
        println!("{cyan}imported into {}{reset}", import.database);
    }
}
