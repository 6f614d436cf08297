//! gtraj CLI - Inspect Gorilla trajectory exports
//!
//! Commands:
//! - inspect: Parse an export and summarize participants, trials and samples
//! - config: Print the effective parser configuration

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gorilla_trajectories::{
    Diagnostics, GorillaReader, IdentitySource, ParseError, ParseOutcome, ParserConfig,
    Precision, SamplePolicy, VERSION,
};

/// gtraj - Rebuild mouse and gaze trajectories from Gorilla exports
#[derive(Parser)]
#[command(name = "gtraj")]
#[command(version = VERSION)]
#[command(about = "Rebuild per-participant trajectories from Gorilla exports", long_about = None)]
struct Cli {
    /// Enable debug-level diagnostics (per-row skips, file-level events)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an export and summarize what was reconstructed
    Inspect {
        /// Consolidated table (.csv/.tsv/.txt) or folder of per-trial files
        input: PathBuf,

        /// Folder holding the per-trial files a consolidated table references
        #[arg(long)]
        trial_folder: Option<PathBuf>,

        /// Export shape
        #[arg(long, value_enum, default_value = "auto")]
        mode: Mode,

        #[command(flatten)]
        options: ParserOptions,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective parser configuration as JSON
    Config {
        #[command(flatten)]
        options: ParserOptions,
    },
}

#[derive(clap::Args)]
struct ParserOptions {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Zone name that starts a new trial
    #[arg(long)]
    trial_start: Option<String>,

    /// Extra column to record once per trial (repeatable)
    #[arg(long = "custom-field")]
    custom_fields: Vec<String>,

    /// Delimiter override for consolidated tables
    #[arg(long)]
    delimiter: Option<char>,

    /// Participant identifier keying the output
    #[arg(long, value_enum)]
    identity: Option<IdentityArg>,

    /// Numeric precision of normalized samples
    #[arg(long, value_enum)]
    precision: Option<PrecisionArg>,

    /// Skip malformed coordinate samples instead of failing
    #[arg(long)]
    skip_malformed: bool,

    /// Parse per-trial files in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Folder if the input is a directory, indexed if --trial-folder is set,
    /// consolidated otherwise
    Auto,
    /// Consolidated table with inline coordinates
    Consolidated,
    /// Consolidated table referencing per-trial files
    Indexed,
    /// Folder of per-trial files
    Folder,
}

#[derive(Clone, Copy, ValueEnum)]
enum IdentityArg {
    Private,
    Public,
}

#[derive(Clone, Copy, ValueEnum)]
enum PrecisionArg {
    Single,
    Double,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GtrajError> {
    match cli.command {
        Commands::Inspect {
            input,
            trial_folder,
            mode,
            options,
            json,
        } => cmd_inspect(&input, trial_folder.as_deref(), mode, &options, json),
        Commands::Config { options } => {
            let config = build_config(&options)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn build_config(options: &ParserOptions) -> Result<ParserConfig, GtrajError> {
    let mut config = match &options.config {
        Some(path) => ParserConfig::load(path)?,
        None => ParserConfig::default(),
    };

    if let Some(zone) = &options.trial_start {
        config.trial_start_zone = Some(zone.clone());
    }
    if !options.custom_fields.is_empty() {
        config.custom_fields = options.custom_fields.clone();
    }
    if let Some(delimiter) = options.delimiter {
        config.delimiter = Some(delimiter);
    }
    if let Some(identity) = options.identity {
        config.identity = match identity {
            IdentityArg::Private => IdentitySource::Private,
            IdentityArg::Public => IdentitySource::Public,
        };
    }
    if let Some(precision) = options.precision {
        config.precision = match precision {
            PrecisionArg::Single => Precision::Single,
            PrecisionArg::Double => Precision::Double,
        };
    }
    if options.skip_malformed {
        config.sample_policy = SamplePolicy::Skip;
    }
    if options.parallel {
        config.parallel = true;
    }
    Ok(config)
}

fn resolve_mode(mode: Mode, input: &Path, trial_folder: Option<&Path>) -> Mode {
    match mode {
        Mode::Auto if input.is_dir() => Mode::Folder,
        Mode::Auto if trial_folder.is_some() => Mode::Indexed,
        Mode::Auto => Mode::Consolidated,
        other => other,
    }
}

fn cmd_inspect(
    input: &Path,
    trial_folder: Option<&Path>,
    mode: Mode,
    options: &ParserOptions,
    json: bool,
) -> Result<(), GtrajError> {
    let config = build_config(options)?;
    let reader = GorillaReader::new(config);
    let mode = resolve_mode(mode, input, trial_folder);

    let outcome = match mode {
        Mode::Folder => reader.folder(input)?,
        Mode::Indexed => {
            let folder = trial_folder.ok_or(GtrajError::MissingTrialFolder)?;
            reader.indexed(input, folder)?
        }
        Mode::Consolidated | Mode::Auto => reader.consolidated(input)?,
    };
    info!(input = %input.display(), mode = mode_name(mode), "parse complete");

    let report = InspectReport::new(input, mode, &outcome, Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Auto => "auto",
        Mode::Consolidated => "consolidated",
        Mode::Indexed => "indexed",
        Mode::Folder => "folder",
    }
}

#[derive(Serialize)]
struct InspectReport {
    generated_at: DateTime<Utc>,
    input: String,
    mode: &'static str,
    participants: Vec<ParticipantSummary>,
    diagnostics: Diagnostics,
}

#[derive(Serialize)]
struct ParticipantSummary {
    id: String,
    resolution: Option<String>,
    viewport: Option<String>,
    trials: usize,
    samples: usize,
    messages: usize,
}

impl InspectReport {
    fn new(input: &Path, mode: Mode, outcome: &ParseOutcome, generated_at: DateTime<Utc>) -> Self {
        let participants = outcome
            .participants
            .iter()
            .map(|p| ParticipantSummary {
                id: p.id.clone(),
                resolution: p.resolution.clone(),
                viewport: p.viewport.clone(),
                trials: p.trials.len(),
                samples: p.trials.iter().map(|t| t.len()).sum(),
                messages: p.trials.iter().map(|t| t.messages.len()).sum(),
            })
            .collect();
        Self {
            generated_at,
            input: input.display().to_string(),
            mode: mode_name(mode),
            participants,
            diagnostics: outcome.diagnostics,
        }
    }
}

fn print_report(report: &InspectReport) {
    println!("Input: {} ({})", report.input, report.mode);
    println!("Participants: {}", report.participants.len());
    println!();
    for p in &report.participants {
        println!(
            "  {}  resolution={}  viewport={}  trials={}  samples={}  messages={}",
            p.id,
            p.resolution.as_deref().unwrap_or("-"),
            p.viewport.as_deref().unwrap_or("-"),
            p.trials,
            p.samples,
            p.messages
        );
    }

    let d = &report.diagnostics;
    println!();
    println!("Diagnostics:");
    println!("  skipped rows:      {}", d.skipped_rows);
    println!("  skipped samples:   {}", d.skipped_samples);
    println!("  pre-trial rows:    {}", d.pre_trial_rows);
    println!("  remote references: {}", d.remote_skipped);
    println!("  missing files:     {}", d.missing_files);
    println!("  empty files:       {}", d.empty_files);
    println!("  ignored entries:   {}", d.skipped_entries);
}

// Error handling

#[derive(Debug)]
enum GtrajError {
    Parse(ParseError),
    Json(serde_json::Error),
    MissingTrialFolder,
}

impl From<ParseError> for GtrajError {
    fn from(e: ParseError) -> Self {
        GtrajError::Parse(e)
    }
}

impl From<serde_json::Error> for GtrajError {
    fn from(e: serde_json::Error) -> Self {
        GtrajError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GtrajError> for CliError {
    fn from(e: GtrajError) -> Self {
        match e {
            GtrajError::Parse(e) => {
                let (code, hint) = match &e {
                    ParseError::NotFound(_) => ("NOT_FOUND", Some("Check file paths")),
                    ParseError::UnsupportedExtension { .. } => (
                        "UNSUPPORTED_EXTENSION",
                        Some("Tables must be .csv/.tsv/.txt, trial files .xls/.xlsx"),
                    ),
                    ParseError::MissingColumn { .. } => (
                        "MISSING_COLUMN",
                        Some("Check --custom-field names and the column names in the config"),
                    ),
                    ParseError::MissingSetting(_) => {
                        ("MISSING_SETTING", Some("Pass --trial-start for consolidated tables"))
                    }
                    ParseError::DelimiterUndetected(_) | ParseError::InvalidDelimiter(_) => {
                        ("DELIMITER_ERROR", Some("Pass --delimiter explicitly"))
                    }
                    ParseError::MalformedSample { .. } => (
                        "MALFORMED_SAMPLE",
                        Some("Use --skip-malformed to drop unreadable coordinate rows"),
                    ),
                    ParseError::IdentityMismatch { .. } => (
                        "IDENTITY_MISMATCH",
                        Some("The export is internally inconsistent; check --identity"),
                    ),
                    ParseError::NumericParse { .. } => ("NUMERIC_PARSE_ERROR", None),
                    ParseError::EmptyTrialFile(_) => ("EMPTY_TRIAL_FILE", None),
                    ParseError::Spreadsheet { .. } => ("SPREADSHEET_ERROR", None),
                    ParseError::Csv(_) => ("CSV_ERROR", None),
                    ParseError::Config(_) => ("CONFIG_ERROR", Some("Check the config JSON")),
                    ParseError::Io(_) => ("IO_ERROR", Some("Check file paths and permissions")),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            GtrajError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            GtrajError::MissingTrialFolder => CliError {
                code: "MISSING_TRIAL_FOLDER".to_string(),
                message: "Indexed mode needs --trial-folder".to_string(),
                hint: None,
            },
        }
    }
}
