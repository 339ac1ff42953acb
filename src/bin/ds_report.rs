use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dataseer_report::config::ConfigLoader;
use dataseer_report::domain::{ReportInput, ReportKind};
use dataseer_report::error::ReportError;
use dataseer_report::google::{DriveHttpClient, SheetsHttpClient};
use dataseer_report::layout::ReportLayout;
use dataseer_report::output::{JsonOutput, OutputMode, TextOutput, TextProgress};
use dataseer_report::report::{self, BuildOptions, Reporter};
use dataseer_report::templates::builtin_layout;

#[derive(Parser)]
#[command(name = "ds-report")]
#[command(about = "Builds data-statement reports into templated Google Sheets")]
#[command(version, author)]
struct Cli {
    /// Print JSON results instead of a text summary.
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Split extracted records into report buckets")]
    Classify(InputArgs),
    #[command(about = "Compute the sheet requests for a report without calling any API")]
    Plan(PlanArgs),
    #[command(about = "Copy the template and fill a report")]
    Build(BuildArgs),
    #[command(about = "Look up a report by name in the reports folder")]
    Find(FindArgs),
    #[command(about = "List report kinds and their buckets")]
    Kinds,
}

#[derive(Args)]
struct InputArgs {
    #[arg(long, value_enum)]
    kind: ReportKind,

    /// Report input JSON.
    #[arg(long)]
    input: Utf8PathBuf,
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Layout JSON; the built-in layout of the kind is used otherwise.
    #[arg(long)]
    layout: Option<Utf8PathBuf>,

    /// Report date as YYYY-MM-DD; defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    input: InputArgs,

    #[arg(long)]
    config: Option<String>,

    /// Report name; defaults to "<document name> - <kind label>".
    #[arg(long)]
    name: Option<String>,

    /// Delete an existing report with the same name first.
    #[arg(long)]
    overwrite: bool,

    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Args)]
struct FindArgs {
    name: String,

    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ReportError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ReportError) -> u8 {
    match error {
        ReportError::MissingConfig
        | ReportError::ConfigRead(_)
        | ReportError::ConfigParse(_)
        | ReportError::MissingTemplate(_)
        | ReportError::MissingAccessToken
        | ReportError::ReportNotFound(_)
        | ReportError::SheetNotFound(_) => 2,
        ReportError::SheetsHttp(_)
        | ReportError::SheetsStatus { .. }
        | ReportError::DriveHttp(_)
        | ReportError::DriveStatus { .. } => 3,
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
        Commands::Classify(args) => run_classify(args, output_mode),
        Commands::Plan(args) => run_plan(args),
        Commands::Build(args) => run_build(args, output_mode),
        Commands::Find(args) => run_find(args, output_mode),
        Commands::Kinds => {
            let kinds = report::kinds();
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_kinds(&kinds).into_diagnostic(),
                OutputMode::Interactive => {
                    TextOutput::print_kinds(&kinds);
                    Ok(())
                }
            }
        }
    }
}

fn run_classify(args: InputArgs, output_mode: OutputMode) -> miette::Result<()> {
    let input = ReportInput::load(&args.input)?;
    let result = report::classify(args.kind, &input);
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_classify(&result).into_diagnostic(),
        OutputMode::Interactive => {
            TextOutput::print_fields(&report::summarize(&result.partitions));
            Ok(())
        }
    }
}

fn run_plan(args: PlanArgs) -> miette::Result<()> {
    let input = ReportInput::load(&args.input.input)?;
    let layout = match &args.layout {
        Some(path) => ReportLayout::load(path)?,
        None => builtin_layout(args.input.kind),
    };
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let plan = report::plan_offline(args.input.kind, &layout, &input, date)?;
    JsonOutput::print_plan(&plan).into_diagnostic()
}

fn run_build(args: BuildArgs, output_mode: OutputMode) -> miette::Result<()> {
    let input = ReportInput::load(&args.input.input)?;
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let options = BuildOptions {
        name: args.name,
        overwrite: args.overwrite,
        dry_run: args.dry_run,
        report_date: args.date,
    };

    let result = if options.dry_run {
        let reporter = Reporter::new(config, OfflineSheets, OfflineDrive);
        build_with(&reporter, args.input.kind, &input, options, output_mode)?
    } else {
        let sheets = SheetsHttpClient::new(&config.api)?;
        let drive = DriveHttpClient::new(&config.api)?;
        let reporter = Reporter::new(config, sheets, drive);
        build_with(&reporter, args.input.kind, &input, options, output_mode)?
    };

    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_build(&result).into_diagnostic(),
        OutputMode::Interactive => {
            TextOutput::print_build(&result);
            Ok(())
        }
    }
}

fn build_with<S, D>(
    reporter: &Reporter<S, D>,
    kind: ReportKind,
    input: &ReportInput,
    options: BuildOptions,
    output_mode: OutputMode,
) -> Result<report::BuildResult, ReportError>
where
    S: dataseer_report::google::SheetsClient,
    D: dataseer_report::google::DriveClient,
{
    match output_mode {
        OutputMode::NonInteractive => reporter.build(kind, input, options, &JsonOutput),
        OutputMode::Interactive => reporter.build(kind, input, options, &TextProgress),
    }
}

fn run_find(args: FindArgs, output_mode: OutputMode) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let sheets = SheetsHttpClient::new(&config.api)?;
    let drive = DriveHttpClient::new(&config.api)?;
    let reporter = Reporter::new(config, sheets, drive);
    let result = reporter.find(&args.name)?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_find(&result).into_diagnostic(),
        OutputMode::Interactive => {
            TextOutput::print_find(&result);
            Ok(())
        }
    }
}

/// Stands in for the APIs during dry runs, which never reach them.
struct OfflineSheets;
struct OfflineDrive;

impl dataseer_report::google::SheetsClient for OfflineSheets {
    fn sheet_properties(
        &self,
        _spreadsheet_id: &str,
    ) -> Result<Vec<dataseer_report::google::SheetProperties>, ReportError> {
        Err(ReportError::SheetsHttp("sheets client not configured".to_string()))
    }

    fn batch_update(
        &self,
        _spreadsheet_id: &str,
        _requests: &[dataseer_report::requests::Request],
    ) -> Result<(), ReportError> {
        Err(ReportError::SheetsHttp("sheets client not configured".to_string()))
    }

    fn values_batch_update(
        &self,
        _spreadsheet_id: &str,
        _data: &[dataseer_report::requests::ValueRange],
    ) -> Result<(), ReportError> {
        Err(ReportError::SheetsHttp("sheets client not configured".to_string()))
    }
}

impl dataseer_report::google::DriveClient for OfflineDrive {
    fn list_files(
        &self,
        _query: &str,
        _page_token: Option<&str>,
    ) -> Result<dataseer_report::google::FileList, ReportError> {
        Err(ReportError::DriveHttp("drive client not configured".to_string()))
    }

    fn copy_file(
        &self,
        _file_id: &str,
        _name: &str,
        _folder_id: &str,
    ) -> Result<dataseer_report::google::DriveFile, ReportError> {
        Err(ReportError::DriveHttp("drive client not configured".to_string()))
    }

    fn delete_file(&self, _file_id: &str) -> Result<(), ReportError> {
        Err(ReportError::DriveHttp("drive client not configured".to_string()))
    }

    fn create_permission(
        &self,
        _file_id: &str,
        _permission: &dataseer_report::google::Permission,
    ) -> Result<(), ReportError> {
        Err(ReportError::DriveHttp("drive client not configured".to_string()))
    }
}
