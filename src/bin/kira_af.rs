use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kira_assembly_fetch::app::{App, ProgressSink, TracingProgress};
use kira_assembly_fetch::config::{Config, ConfigLoader};
use kira_assembly_fetch::error::KiraError;
use kira_assembly_fetch::extract::{ExtractorStatus, VdbDumpExtractor};
use kira_assembly_fetch::output::{JsonOutput, OutputMode, print_run_summary};
use kira_assembly_fetch::resolver::SdlHttpClient;

#[derive(Parser)]
#[command(name = "kira-af")]
#[command(about = "Download SKESA assemblies from NCBI SRA in bulk")]
#[command(version, author)]
struct Cli {
    /// Tab-delimited file with a header row; accessions in the first column
    #[arg(long)]
    acs: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Number of accessions per SDL query [default: 100]
    #[arg(long)]
    batch_size: Option<usize>,

    /// Maximum number of files per output folder [default: 5000]
    #[arg(long)]
    folder_size: Option<usize>,

    /// Output folder name prefix [default: X]
    #[arg(long)]
    folder_prefix: Option<String>,

    /// Accession lookup URL; accessions are appended comma-separated
    #[arg(long)]
    sdl_url: Option<String>,

    /// Overwrite an existing output directory
    #[arg(long)]
    force: bool,

    /// Worker threads, capped at available parallelism [default: 1]
    #[arg(long)]
    num_threads: Option<usize>,

    /// Lower bound of the random pause around remote calls [default: 1000]
    #[arg(long)]
    throttle_min_ms: Option<u64>,

    /// Upper bound of the random pause around remote calls [default: 10000]
    #[arg(long)]
    throttle_max_ms: Option<u64>,

    /// JSON settings file (defaults to ./kira-af.json when present)
    #[arg(long)]
    config: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::EmptyInput(_)
        | KiraError::OutputExists(_)
        | KiraError::AccessionRead(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::InvalidConfig(_) => 2,
        KiraError::SdlHttp(_)
        | KiraError::SdlStatus { .. }
        | KiraError::MissingTool(_)
        | KiraError::Extraction(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let file = ConfigLoader::load(cli.config.as_deref())?;
    let overrides = Config {
        acs: cli.acs,
        outdir: cli.outdir,
        batch_size: cli.batch_size,
        folder_size: cli.folder_size,
        folder_prefix: cli.folder_prefix,
        sdl_url: cli.sdl_url,
        force: cli.force.then_some(true),
        num_threads: cli.num_threads,
        throttle_min_ms: cli.throttle_min_ms,
        throttle_max_ms: cli.throttle_max_ms,
    };
    let config = ConfigLoader::resolve_config(file, overrides)?;

    let extractor = VdbDumpExtractor::new();
    if let ExtractorStatus::Missing { message } = extractor.tool_status() {
        warn!("{message}; every fetch will fail");
    }
    let locator = SdlHttpClient::new()?;
    let app = App::new(locator, extractor);

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Human => &TracingProgress,
        OutputMode::Json => &JsonOutput,
    };
    let result = app.run(&config, sink)?;
    match output_mode {
        OutputMode::Human => print_run_summary(&result),
        OutputMode::Json => JsonOutput::print_run(&result).into_diagnostic()?,
    }
    Ok(())
}
