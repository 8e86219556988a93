//! inj-points CLI
//!
//! Commands:
//! - serve: Run the HTTP service
//! - normalize: Sanitize a raw snapshot payload and print the stored document
//! - reduce: Fold NDJSON tracking events into a sessions document
//! - schema: Print the stored document schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use inj_points::pipeline::{now_millis, sanitize_snapshot};
use inj_points::server::run_server;
use inj_points::tracking::{NameDirectory, SessionLog, TrackRequest};
use inj_points::types::{MAX_EVENTS, MAX_POINTS, SNAPSHOT_VERSION};
use inj_points::{PointsError, ServiceConfig, VERSION};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// inj-points - Snapshot persistence and session tracking for points dashboards
#[derive(Parser)]
#[command(name = "inj-points")]
#[command(version = VERSION)]
#[command(about = "Persist sanitized dashboard snapshots and track sessions", long_about = None)]
struct Cli {
    /// Emit logs as JSON even on a terminal
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listen address (overrides INJ_POINTS_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Directory for stored documents (overrides INJ_POINTS_DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Public base URL for stored documents (overrides INJ_POINTS_PUBLIC_URL)
        #[arg(long)]
        public_url: Option<String>,

        /// Maximum request body size in bytes (overrides INJ_POINTS_MAX_BODY_BYTES)
        #[arg(long)]
        max_body_bytes: Option<usize>,

        /// Keep documents in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Sanitize a raw snapshot payload and print the stored document
    Normalize {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Fold NDJSON tracking events into a sessions document
    Reduce {
        /// Existing sessions document to start from
        #[arg(long)]
        sessions: Option<PathBuf>,

        /// Existing names document to start from
        #[arg(long)]
        names: Option<PathBuf>,

        /// NDJSON tracking events (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Print schema information
    Schema {
        /// Document to describe
        #[arg(value_enum)]
        document: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Per-address snapshot document
    Snapshot,
    /// Session record in the shared sessions document
    Session,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

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

fn init_tracing(force_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if force_json || !atty::is(atty::Stream::Stderr) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<(), InjCliError> {
    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            public_url,
            max_body_bytes,
            ephemeral,
        } => {
            let mut config = ServiceConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(url) = public_url {
                config.public_base_url = Some(url);
            }
            if let Some(limit) = max_body_bytes {
                config.max_body_bytes = limit;
            }
            config.ephemeral |= ephemeral;
            cmd_serve(config)
        }
        Commands::Normalize { input, pretty } => cmd_normalize(&input, pretty),
        Commands::Reduce {
            sessions,
            names,
            input,
            pretty,
        } => cmd_reduce(sessions.as_deref(), names.as_deref(), &input, pretty),
        Commands::Schema { document } => {
            cmd_schema(document);
            Ok(())
        }
    }
}

fn cmd_serve(config: ServiceConfig) -> Result<(), InjCliError> {
    config.validate()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_server(config))?;
    Ok(())
}

fn cmd_normalize(input: &Path, pretty: bool) -> Result<(), InjCliError> {
    let bytes = read_input(input)?;
    let snapshot = sanitize_snapshot(&bytes)?;
    info!(
        stake = snapshot.stake.len(),
        withdrawals = snapshot.withdrawals.len(),
        networth = snapshot.networth.len(),
        events = snapshot.events.len(),
        "snapshot normalized"
    );
    print_json(&snapshot, pretty)
}

fn cmd_reduce(
    sessions: Option<&Path>,
    names: Option<&Path>,
    input: &Path,
    pretty: bool,
) -> Result<(), InjCliError> {
    let mut log = match sessions {
        Some(path) => SessionLog::from_json(&path.display().to_string(), &fs::read(path)?),
        None => SessionLog::default(),
    };
    let mut directory = match names {
        Some(path) => NameDirectory::from_json(&path.display().to_string(), &fs::read(path)?),
        None => NameDirectory::default(),
    };

    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(fs::File::open(input)?))
    };

    let mut applied = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: Value = serde_json::from_str(line)
            .map_err(|e| InjCliError::Line(index + 1, PointsError::from(e)))?;
        match TrackRequest::parse(&raw, now_millis()) {
            Ok(TrackRequest::Session(event)) => {
                log.apply(&event);
                applied += 1;
            }
            Ok(TrackRequest::Name { device_id, name }) => {
                directory.upsert(&device_id, &name);
                applied += 1;
            }
            Err(e) => warn!(line = index + 1, error = %e, "skipping tracking event"),
        }
    }

    info!(applied, sessions = log.len(), names = directory.len(), "events reduced");
    let output = serde_json::json!({
        "sessions": log.records(),
        "names": directory,
    });
    print_json(&output, pretty)
}

fn cmd_schema(document: SchemaType) {
    let schema = match document {
        SchemaType::Snapshot => snapshot_json_schema(),
        SchemaType::Session => session_json_schema(),
    };
    println!("{}", serde_json::to_string_pretty(&schema).unwrap_or_default());
}

// Helper functions

fn read_input(input: &Path) -> Result<Vec<u8>, InjCliError> {
    if input.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read(input)?)
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), InjCliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn number_array() -> Value {
    serde_json::json!({ "type": "array", "items": { "type": "number" }, "maxItems": MAX_POINTS })
}

fn string_array() -> Value {
    serde_json::json!({ "type": "array", "items": { "type": "string" }, "maxItems": MAX_POINTS })
}

fn snapshot_json_schema() -> Value {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "inj-points snapshot",
        "description": "Sanitized per-address dashboard snapshot; arrays within a series are index-aligned",
        "type": "object",
        "required": ["version", "writtenAt", "stake", "withdrawals", "networth", "events"],
        "properties": {
            "version": { "type": "integer", "const": SNAPSHOT_VERSION },
            "writtenAt": { "type": "integer", "description": "Unix milliseconds" },
            "stake": {
                "type": "object",
                "properties": {
                    "labels": string_array(),
                    "data": number_array(),
                    "moves": number_array(),
                    "types": string_array()
                }
            },
            "withdrawals": {
                "type": "object",
                "properties": {
                    "labels": string_array(),
                    "values": number_array(),
                    "times": number_array()
                }
            },
            "networth": {
                "type": "object",
                "properties": {
                    "times": number_array(),
                    "usd": number_array(),
                    "inj": number_array()
                }
            },
            "events": {
                "type": "array",
                "maxItems": MAX_EVENTS,
                "items": {
                    "type": "object",
                    "required": ["id", "ts", "kind", "title", "detail", "value", "dir", "status"],
                    "properties": {
                        "id": { "type": "string" },
                        "ts": { "type": "integer" },
                        "kind": { "type": "string" },
                        "title": { "type": "string" },
                        "detail": { "type": "string" },
                        "value": { "type": "number" },
                        "dir": { "type": "string" },
                        "status": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn session_json_schema() -> Value {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "inj-points session",
        "type": "object",
        "required": ["sessionId", "deviceId", "startTs", "lastTs", "endTs", "beats"],
        "properties": {
            "sessionId": { "type": "string" },
            "deviceId": { "type": "string" },
            "startTs": { "type": "integer" },
            "lastTs": { "type": "integer" },
            "endTs": { "type": ["integer", "null"] },
            "beats": { "type": "integer", "minimum": 0 },
            "page": { "type": "string" },
            "deviceInfo": { "type": "object", "additionalProperties": { "type": "string" } },
            "endReason": { "type": "string" }
        }
    })
}

// Error handling

enum InjCliError {
    Io(io::Error),
    Points(PointsError),
    Json(serde_json::Error),
    Line(usize, PointsError),
}

impl From<io::Error> for InjCliError {
    fn from(e: io::Error) -> Self {
        InjCliError::Io(e)
    }
}

impl From<PointsError> for InjCliError {
    fn from(e: PointsError) -> Self {
        InjCliError::Points(e)
    }
}

impl From<serde_json::Error> for InjCliError {
    fn from(e: serde_json::Error) -> Self {
        InjCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InjCliError> for CliError {
    fn from(e: InjCliError) -> Self {
        match e {
            InjCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InjCliError::Points(PointsError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Check INJ_POINTS_* environment variables and flags".to_string()),
            },
            InjCliError::Points(e) => CliError {
                code: "PAYLOAD_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Input must be a JSON object with stake, withdrawals, networth and events".to_string()),
            },
            InjCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            InjCliError::Line(line, e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: format!("line {line}: {e}"),
                hint: Some("Input must be newline-delimited JSON, one event per line".to_string()),
            },
        }
    }
}
