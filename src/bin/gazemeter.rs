//! Gazemeter CLI - drive an attention telemetry session from a detection stream
//!
//! Commands:
//! - run: Drive a live session from NDJSON detection events
//! - validate: Validate a detection event stream
//! - doctor: Diagnose storage and retry-queue health

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use gazemeter::collector::HttpCollector;
use gazemeter::config::{SessionConfig, QUEUE_STORAGE_KEY};
use gazemeter::detector::{parse_event, DetectionEvent};
use gazemeter::runtime::SessionRuntime;
use gazemeter::session::SessionController;
use gazemeter::storage::{FileStorage, QueueStorage};
use gazemeter::types::{format_elapsed, Batch, DeliveryStatus, SessionStatus};
use gazemeter::{TelemetryError, PRODUCER_NAME, VERSION};

/// Gazemeter - attention telemetry from facial landmark streams
#[derive(Parser)]
#[command(name = "gazemeter")]
#[command(version = VERSION)]
#[command(about = "Turn facial landmark detections into attention telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a live session from NDJSON detection events on stdin
    Run {
        /// Collector base URL
        #[arg(long, default_value = "http://localhost:8000/api")]
        collector_url: String,

        /// Directory for the persisted retry queue
        #[arg(long, default_value = ".gazemeter")]
        storage_dir: PathBuf,

        /// Input file with detection events (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Calibration window in milliseconds
        #[arg(long)]
        calibration_ms: Option<u64>,

        /// Batch flush interval in milliseconds
        #[arg(long)]
        batch_interval_ms: Option<u64>,

        /// Looking-away threshold on baseline-adjusted yaw deviation
        #[arg(long)]
        yaw_threshold: Option<f64>,

        /// Suppress per-second status lines
        #[arg(long)]
        quiet: bool,
    },

    /// Validate a detection event stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose storage and retry-queue health
    Doctor {
        /// Directory holding the persisted retry queue
        #[arg(long, default_value = ".gazemeter")]
        storage_dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_logging();
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

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), GazemeterCliError> {
    match cli.command {
        Commands::Run {
            collector_url,
            storage_dir,
            input,
            calibration_ms,
            batch_interval_ms,
            yaw_threshold,
            quiet,
        } => {
            let mut config = SessionConfig {
                collector_url,
                ..SessionConfig::default()
            };
            if let Some(ms) = calibration_ms {
                config.calibration_ms = ms;
            }
            if let Some(ms) = batch_interval_ms {
                config.batch_interval_ms = ms;
            }
            if let Some(threshold) = yaw_threshold {
                config.yaw_threshold = threshold;
            }
            cmd_run(config, &storage_dir, &input, quiet)
        }

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { storage_dir, json } => cmd_doctor(&storage_dir, json),
    }
}

fn cmd_run(
    config: SessionConfig,
    storage_dir: &PathBuf,
    input: &PathBuf,
    quiet: bool,
) -> Result<(), GazemeterCliError> {
    let collector = HttpCollector::new(config.collector_url.clone())?;
    let storage = FileStorage::new(storage_dir);
    let controller = SessionController::new(config, collector, storage);

    // The session loop is cooperative and single-threaded; only the
    // blocking stdin reader lives on its own OS thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (frames_tx, frames_rx) = tokio::sync::mpsc::channel::<DetectionEvent>(32);
    let reader = spawn_frame_reader(input.clone(), frames_tx)?;

    let (status_tx, mut status_rx) = tokio::sync::mpsc::channel::<SessionStatus>(8);

    let controller = runtime.block_on(async move {
        let printer = tokio::spawn(async move {
            while let Some(status) = status_rx.recv().await {
                if !quiet {
                    eprintln!("{}", status_line(&status));
                }
            }
        });
        let controller = SessionRuntime::new(controller)
            .run(frames_rx, Some(status_tx))
            .await;
        let _ = printer.await;
        controller
    });

    reader
        .join()
        .map_err(|_| GazemeterCliError::FrameReaderPanicked)??;

    let status = controller.status();
    match status.delivery {
        DeliveryStatus::Completed => {
            if let Some(report) = &status.report {
                println!("{}", report);
            }
            eprintln!(
                "session completed: {} batches delivered",
                status.delivered_batches
            );
            Ok(())
        }
        DeliveryStatus::ReportFailed => Err(GazemeterCliError::ReportFailed),
        _ => Ok(()),
    }
}

/// Read NDJSON detection events off the input on a dedicated thread,
/// pushing them into the session's frame channel. Closing the channel on
/// EOF is what stops the session.
fn spawn_frame_reader(
    input: PathBuf,
    frames_tx: tokio::sync::mpsc::Sender<DetectionEvent>,
) -> Result<thread::JoinHandle<Result<(), GazemeterCliError>>, GazemeterCliError> {
    let handle = thread::spawn(move || -> Result<(), GazemeterCliError> {
        let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
            Box::new(io::stdin().lock())
        } else {
            Box::new(io::BufReader::new(fs::File::open(&input)?))
        };

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_event(trimmed) {
                Ok(event) => {
                    if frames_tx.blocking_send(event).is_err() {
                        // Session ended on its own; stop reading.
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed detection line");
                }
            }
        }
        Ok(())
    });
    Ok(handle)
}

fn status_line(status: &SessionStatus) -> String {
    let delivery = match status.delivery {
        DeliveryStatus::Idle => "idle",
        DeliveryStatus::WaitingForFace => "waiting for face",
        DeliveryStatus::Calibrating => "calibrating",
        DeliveryStatus::Healthy => "receiving data",
        DeliveryStatus::Degraded => "connection issue (queuing)",
        DeliveryStatus::GeneratingReport => "generating report",
        DeliveryStatus::Completed => "session completed",
        DeliveryStatus::ReportFailed => "report generation failed",
    };
    let elapsed = status
        .elapsed_secs
        .map(format_elapsed)
        .unwrap_or_else(|| "--:--".to_string());
    let attention = status
        .attention_pct
        .map(|pct| format!("{}%", pct))
        .unwrap_or_else(|| "--%".to_string());

    match status.calibration_samples {
        Some(samples) => format!(
            "[{}] {} · {} samples collected",
            elapsed, delivery, samples
        ),
        None => format!(
            "[{}] {} · attention {} · delivered {} · queued {}",
            elapsed, delivery, attention, status.delivered_batches, status.queued_batches
        ),
    }
}

fn cmd_validate(input: &PathBuf, json: bool) -> Result<(), GazemeterCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let mut report = ValidationReport::default();
    for (index, line) in input_data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.total_events += 1;
        let result = parse_event(trimmed).and_then(|e| e.into_detection().validate());
        match result {
            Ok(()) => report.valid_events += 1,
            Err(e) => report.errors.push(ValidationErrorDetail {
                line: index + 1,
                error: e.to_string(),
            }),
        }
    }
    report.invalid_events = report.errors.len();

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
                println!("  - line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(GazemeterCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(storage_dir: &PathBuf, json: bool) -> Result<(), GazemeterCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, VERSION),
    });

    // Persisted retry queue: absent is healthy, corrupt is an error the
    // session would silently recover from by starting empty.
    let storage = FileStorage::new(storage_dir);
    match storage.get(QUEUE_STORAGE_KEY) {
        Ok(None) => checks.push(DoctorCheck {
            name: "retry_queue".to_string(),
            status: CheckStatus::Ok,
            message: "no pending batches".to_string(),
        }),
        Ok(Some(content)) => match serde_json::from_str::<Vec<Batch>>(&content) {
            Ok(batches) => checks.push(DoctorCheck {
                name: "retry_queue".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} pending batches awaiting delivery", batches.len()),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "retry_queue".to_string(),
                status: CheckStatus::Warning,
                message: format!("persisted queue corrupt (will start empty): {}", e),
            }),
        },
        Err(e) => checks.push(DoctorCheck {
            name: "retry_queue".to_string(),
            status: CheckStatus::Error,
            message: format!("storage unreadable: {}", e),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Gazemeter Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GazemeterCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum GazemeterCliError {
    Io(io::Error),
    Telemetry(TelemetryError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
    ReportFailed,
    FrameReaderPanicked,
}

impl From<io::Error> for GazemeterCliError {
    fn from(e: io::Error) -> Self {
        GazemeterCliError::Io(e)
    }
}

impl From<TelemetryError> for GazemeterCliError {
    fn from(e: TelemetryError) -> Self {
        GazemeterCliError::Telemetry(e)
    }
}

impl From<serde_json::Error> for GazemeterCliError {
    fn from(e: serde_json::Error) -> Self {
        GazemeterCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GazemeterCliError> for CliError {
    fn from(e: GazemeterCliError) -> Self {
        match e {
            GazemeterCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GazemeterCliError::Telemetry(e) => CliError {
                code: "TELEMETRY_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            GazemeterCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GazemeterCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Run 'gazemeter validate' for details".to_string()),
            },
            GazemeterCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            GazemeterCliError::ReportFailed => CliError {
                code: "REPORT_FAILED".to_string(),
                message: "Session ended but the close request failed".to_string(),
                hint: Some("Queued batches stay persisted for the next session".to_string()),
            },
            GazemeterCliError::FrameReaderPanicked => CliError {
                code: "READER_PANIC".to_string(),
                message: "Detection reader thread panicked".to_string(),
                hint: None,
            },
        }
    }
}

// Report types

#[derive(Default, serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
