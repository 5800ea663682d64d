//! Intervals CLI - Command-line interface for ide-intervals
//!
//! Commands:
//! - transform: Turn one event archive into intervals
//! - batch: Process a directory of archives with a worker pool
//! - validate: Validate recorded events

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ide_intervals::batch::{ArchiveReader, BatchProcessor};
use ide_intervals::config::{BatchConfig, GroupBy};
use ide_intervals::schema::{Event, EventAdapter};
use ide_intervals::types::Interval;
use ide_intervals::{IntervalError, IntervalTransformer, VERSION};

/// Turn recorded IDE interaction events into activity intervals
#[derive(Parser)]
#[command(name = "intervals")]
#[command(version = VERSION)]
#[command(about = "Transform IDE event streams into activity intervals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform one event archive into intervals
    Transform {
        /// Input archive (.ndjson or .ndjson.zst, use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// User identifier attached to every interval
        #[arg(long)]
        user: Option<String>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Batch configuration file; only its pipeline section is used
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Process every archive below a directory
    Batch {
        /// Directory containing input archives
        #[arg(long)]
        input: PathBuf,

        /// Existing directory receiving the output archives
        #[arg(long)]
        output: PathBuf,

        /// Number of worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Maximum number of simultaneously open output archives
        #[arg(long)]
        cache_capacity: Option<usize>,

        /// Grouping of output archives
        #[arg(long)]
        group_by: Option<GroupByArg>,

        /// Batch configuration file (command-line flags take precedence)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate recorded events
    Validate {
        /// Input archive (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one interval per line)
    Ndjson,
    /// JSON array of intervals
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum GroupByArg {
    /// One output folder per input archive
    User,
    /// One output folder per project
    Project,
}

impl From<GroupByArg> for GroupBy {
    fn from(arg: GroupByArg) -> Self {
        match arg {
            GroupByArg::User => GroupBy::User,
            GroupByArg::Project => GroupBy::Project,
        }
    }
}

fn main() -> ExitCode {
    // RUST_LOG overrides the default level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), IntervalsCliError> {
    match cli.command {
        Commands::Transform {
            input,
            output,
            user,
            output_format,
            config,
        } => cmd_transform(
            &input,
            &output,
            user.as_deref(),
            output_format,
            config.as_deref(),
        ),

        Commands::Batch {
            input,
            output,
            workers,
            cache_capacity,
            group_by,
            config,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(cache_capacity) = cache_capacity {
                config.cache_capacity = cache_capacity;
            }
            if let Some(group_by) = group_by {
                config.group_by = group_by.into();
            }
            cmd_batch(&input, &output, config, json)
        }

        Commands::Validate { input, json } => cmd_validate(&input, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<BatchConfig, IntervalsCliError> {
    match path {
        Some(path) => Ok(BatchConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(BatchConfig::default()),
    }
}

/// Read all events of an archive or of stdin, skipping malformed lines
fn read_events(input: &Path) -> Result<Vec<Event>, IntervalsCliError> {
    let events = if input.to_string_lossy() == "-" {
        let reader: Box<dyn BufRead> = Box::new(BufReader::new(io::stdin()));
        ArchiveReader::new(reader).collect::<Result<Vec<_>, _>>()?
    } else {
        ArchiveReader::open(input)?.collect::<Result<Vec<_>, _>>()?
    };
    Ok(events)
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    user: Option<&str>,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), IntervalsCliError> {
    let config = load_config(config)?;
    let events = read_events(input)?;

    if events.is_empty() {
        return Err(IntervalsCliError::NoEvents);
    }

    let intervals = IntervalTransformer::new(config.pipeline).transform(events, user)?;
    let output_data = format_output(&intervals, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_batch(
    input: &Path,
    output: &Path,
    config: BatchConfig,
    json: bool,
) -> Result<(), IntervalsCliError> {
    let report = BatchProcessor::new(config).run_directory(input, output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Batch Report ({})", report.run_id);
        println!("=============");
        println!("Archives:        {}", report.archives);
        println!("Processed:       {}", report.processed);
        println!("Intervals:       {}", report.intervals);
        println!("Malformed lines: {}", report.malformed_lines);

        if !report.failures.is_empty() {
            println!("\nFailures:");
            for failure in &report.failures {
                println!("  - {}: {}", failure.archive.display(), failure.error);
            }
        }
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(IntervalsCliError::BatchFailed(report.failures.len()))
    }
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), IntervalsCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else if input.extension().is_some_and(|ext| ext == "zst") {
        let bytes = zstd::stream::decode_all(fs::File::open(input)?)?;
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        fs::read_to_string(input)?
    };

    // strict parsing: a malformed line is a validation failure of its own
    let events = EventAdapter::parse_ndjson(&input_data)?;
    let results = EventAdapter::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                kind: r.kind.to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} event (index {}): {}", err.kind, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(IntervalsCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn format_output(
    intervals: &[Interval],
    format: &OutputFormat,
) -> Result<String, IntervalsCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for interval in intervals {
                lines.push(serde_json::to_string(interval)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(intervals)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(intervals)?),
    }
}

// Error types

#[derive(Debug)]
enum IntervalsCliError {
    Io(io::Error),
    Pipeline(IntervalError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    BatchFailed(usize),
}

impl From<io::Error> for IntervalsCliError {
    fn from(e: io::Error) -> Self {
        IntervalsCliError::Io(e)
    }
}

impl From<IntervalError> for IntervalsCliError {
    fn from(e: IntervalError) -> Self {
        IntervalsCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for IntervalsCliError {
    fn from(e: serde_json::Error) -> Self {
        IntervalsCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<IntervalsCliError> for CliError {
    fn from(e: IntervalsCliError) -> Self {
        match e {
            IntervalsCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            IntervalsCliError::Pipeline(e @ IntervalError::NonMonotonicStream { .. }) => CliError {
                code: "UNORDERED_STREAM".to_string(),
                message: e.to_string(),
                hint: Some("Events must be sorted by trigger time".to_string()),
            },
            IntervalsCliError::Pipeline(e @ IntervalError::InvalidConfig(_))
            | IntervalsCliError::Pipeline(e @ IntervalError::InvalidCapacity(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the configuration file and flags".to_string()),
            },
            IntervalsCliError::Pipeline(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'intervals validate' on the input".to_string()),
            },
            IntervalsCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            IntervalsCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            IntervalsCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            IntervalsCliError::BatchFailed(count) => CliError {
                code: "BATCH_FAILED".to_string(),
                message: format!("{} archives could not be processed", count),
                hint: Some("Review the batch report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    kind: String,
    error: String,
}
