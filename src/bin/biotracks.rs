//! biotracks CLI - decode captured sensor streams and summarize RR series
//!
//! Commands:
//! - decode: Replay a captured byte stream through a sensor session
//! - hrv: Compute HRV statistics for a list of RR intervals
//! - config: Print the default sensor / HRV configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use biotracks_flux::codec::parse_hex;
use biotracks_flux::config::{HrvConfig, SensorConfig};
use biotracks_flux::session::SensorSession;
use biotracks_flux::stats::HrvSummary;
use biotracks_flux::types::{TelemetryRecord, Vendor};
use biotracks_flux::{ComputeError, BIOTRACKS_VERSION, PRODUCER_NAME};

/// biotracks - Wearable biosensor decoding and HRV statistics
#[derive(Parser)]
#[command(name = "biotracks")]
#[command(version = BIOTRACKS_VERSION)]
#[command(about = "Decode wearable sensor streams into telemetry records", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a captured byte stream through a sensor session
    Decode {
        /// Sensor vendor
        #[arg(long, value_enum)]
        vendor: VendorArg,

        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Treat the input as hex text instead of raw bytes
        #[arg(long)]
        hex: bool,

        /// Sensor configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Feed the stream in chunks of this many bytes (0 feeds it whole).
        /// BLE vendors treat each line of hex input as one notification.
        #[arg(long, default_value = "0")]
        chunk: usize,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Print session counters to stderr when done
        #[arg(long)]
        stats: bool,
    },

    /// Compute HRV statistics for a list of RR intervals (ms)
    Hrv {
        /// Input file path (use - for stdin); a JSON array or whitespace-separated numbers
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// HRV configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the summary
        #[arg(long)]
        pretty: bool,
    },

    /// Print the default configuration
    Config {
        #[arg(value_enum)]
        kind: ConfigKind,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a sensor configuration file
        #[arg(long)]
        sensor_config: Option<PathBuf>,

        /// Check an HRV configuration file
        #[arg(long)]
        hrv_config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VendorArg {
    Polar,
    Zephyr,
    Neurosky,
    BleHrm,
    BleCsc,
}

impl From<VendorArg> for Vendor {
    fn from(v: VendorArg) -> Self {
        match v {
            VendorArg::Polar => Vendor::Polar,
            VendorArg::Zephyr => Vendor::Zephyr,
            VendorArg::Neurosky => Vendor::Neurosky,
            VendorArg::BleHrm => Vendor::BleHrm,
            VendorArg::BleCsc => Vendor::BleCsc,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum ConfigKind {
    /// Per-connection sensor configuration
    Sensor,
    /// HRV statistics configuration
    Hrv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: Cli) -> Result<(), BiotracksCliError> {
    match cli.command {
        Commands::Decode {
            vendor,
            input,
            hex,
            config,
            chunk,
            output_format,
            stats,
        } => cmd_decode(
            vendor.into(),
            &input,
            hex,
            config.as_deref(),
            chunk,
            output_format,
            stats,
        ),

        Commands::Hrv {
            input,
            config,
            pretty,
        } => cmd_hrv(&input, config.as_deref(), pretty),

        Commands::Config { kind } => cmd_config(kind),

        Commands::Doctor {
            sensor_config,
            hrv_config,
            json,
        } => cmd_doctor(sensor_config.as_deref(), hrv_config.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<Vec<u8>, BiotracksCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read(input)?)
    }
}

fn read_text(input: &Path) -> Result<String, BiotracksCliError> {
    String::from_utf8(read_input(input)?)
        .map_err(|e| BiotracksCliError::ParseError(format!("Input is not UTF-8: {}", e)))
}

fn load_sensor_config(path: Option<&Path>) -> Result<SensorConfig, BiotracksCliError> {
    match path {
        Some(path) => Ok(SensorConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(SensorConfig::default()),
    }
}

fn load_hrv_config(path: Option<&Path>) -> Result<HrvConfig, BiotracksCliError> {
    match path {
        Some(path) => Ok(HrvConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(HrvConfig::default()),
    }
}

/// Split the input into the payloads handed to the session
fn payloads(
    vendor: Vendor,
    input: &Path,
    hex: bool,
    chunk: usize,
) -> Result<Vec<Vec<u8>>, BiotracksCliError> {
    if hex && vendor.is_ble() {
        let text = read_text(input)?;
        return text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_hex(line).map_err(BiotracksCliError::from))
            .collect();
    }

    let bytes = if hex {
        parse_hex(&read_text(input)?)?
    } else {
        read_input(input)?
    };
    if chunk == 0 || vendor.is_ble() {
        Ok(vec![bytes])
    } else {
        Ok(bytes.chunks(chunk).map(|c| c.to_vec()).collect())
    }
}

fn cmd_decode(
    vendor: Vendor,
    input: &Path,
    hex: bool,
    config: Option<&Path>,
    chunk: usize,
    output_format: OutputFormat,
    stats: bool,
) -> Result<(), BiotracksCliError> {
    let config = load_sensor_config(config)?;
    let mut session = SensorSession::new(vendor, config);

    let mut stdout = io::stdout();
    let mut records: Vec<TelemetryRecord> = Vec::new();

    for payload in payloads(vendor, input, hex, chunk)? {
        for record in session.feed(&payload) {
            match output_format {
                OutputFormat::Ndjson => writeln!(stdout, "{}", record.to_json()?)?,
                OutputFormat::Json | OutputFormat::JsonPretty => records.push(record),
            }
        }
    }

    match output_format {
        OutputFormat::Ndjson => {}
        OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string(&records)?)?,
        OutputFormat::JsonPretty => writeln!(stdout, "{}", serde_json::to_string_pretty(&records)?)?,
    }
    stdout.flush()?;

    let counters = session.stats();
    log::info!(
        "{}: {} frames decoded, {} rejected, {} bytes skipped, {} pending",
        vendor,
        counters.frames_decoded,
        counters.frames_rejected,
        counters.bytes_skipped,
        session.pending()
    );
    if stats {
        eprintln!("{}", serde_json::to_string(&counters)?);
    }

    if counters.frames_decoded == 0 {
        return Err(BiotracksCliError::NoRecords);
    }
    Ok(())
}

/// RR intervals from a JSON array or whitespace / comma separated numbers
fn parse_rr(text: &str) -> Result<Vec<f64>, BiotracksCliError> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|e| BiotracksCliError::ParseError(format!("Bad RR value {:?}: {}", token, e)))
        })
        .collect()
}

fn cmd_hrv(input: &Path, config: Option<&Path>, pretty: bool) -> Result<(), BiotracksCliError> {
    let config = load_hrv_config(config)?;
    let rr = parse_rr(&read_text(input)?)?;
    if rr.is_empty() {
        return Err(BiotracksCliError::NoRecords);
    }

    let summary = HrvSummary::compute(&rr, &config);
    // pretty by default when a person is reading
    if pretty || atty::is(atty::Stream::Stdout) {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.to_json()?);
    }
    Ok(())
}

fn cmd_config(kind: ConfigKind) -> Result<(), BiotracksCliError> {
    let json = match kind {
        ConfigKind::Sensor => SensorConfig::default().to_json()?,
        ConfigKind::Hrv => HrvConfig::default().to_json()?,
    };
    println!("{}", json);
    Ok(())
}

fn check_config<T>(
    name: &str,
    path: &Path,
    parse: impl FnOnce(&str) -> Result<T, ComputeError>,
) -> DoctorCheck {
    let (status, message) = match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(_) => (CheckStatus::Ok, format!("{} is valid", path.display())),
            Err(e) => (CheckStatus::Error, format!("Invalid configuration: {}", e)),
        },
        Err(e) => (CheckStatus::Error, format!("Cannot read {}: {}", path.display(), e)),
    };
    DoctorCheck {
        name: name.to_string(),
        status,
        message,
    }
}

fn cmd_doctor(
    sensor_config: Option<&Path>,
    hrv_config: Option<&Path>,
    json: bool,
) -> Result<(), BiotracksCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("biotracks version {}", BIOTRACKS_VERSION),
    });

    checks.push(DoctorCheck {
        name: "vendors".to_string(),
        status: CheckStatus::Ok,
        message: Vendor::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    });

    if let Some(path) = sensor_config {
        checks.push(check_config("sensor_config", path, SensorConfig::from_json));
    }
    if let Some(path) = hrv_config {
        checks.push(check_config("hrv_config", path, HrvConfig::from_json));
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
            message: "stdin is a pipe (replay ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: BIOTRACKS_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("biotracks Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BiotracksCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum BiotracksCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BiotracksCliError {
    fn from(e: io::Error) -> Self {
        BiotracksCliError::Io(e)
    }
}

impl From<ComputeError> for BiotracksCliError {
    fn from(e: ComputeError) -> Self {
        BiotracksCliError::Compute(e)
    }
}

impl From<serde_json::Error> for BiotracksCliError {
    fn from(e: serde_json::Error) -> Self {
        BiotracksCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BiotracksCliError> for CliError {
    fn from(e: BiotracksCliError) -> Self {
        match e {
            BiotracksCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BiotracksCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the vendor and configuration".to_string()),
            },
            BiotracksCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BiotracksCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "Input produced no records".to_string(),
                hint: Some("Check that the capture matches the selected vendor".to_string()),
            },
            BiotracksCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            BiotracksCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

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
    Error,
}
