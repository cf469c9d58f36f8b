use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use csv::Writer;
use serde::Serialize;
use thiserror::Error;

use module_emulator::config::{load_config, Config, ConfigError};
use module_emulator::emulator::{build_emulator, ModuleEmulator, ModuleKind};
use module_emulator::gcode::parse_line;

#[derive(Debug, Error)]
enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Replay a GCODE file through one emulator and record every exchange.
#[derive(Debug, Parser)]
#[command(name = "emulator-harness", version, about)]
struct Cli {
    /// Module to emulate.
    #[arg(short, long, value_enum)]
    module: ModuleKind,

    /// Input file, one request line per line. Lines starting with `;` are comments.
    #[arg(short, long)]
    input: PathBuf,

    /// CSV output path.
    #[arg(short, long, default_value = "results.csv")]
    output: PathBuf,

    /// Optional JSON-lines output path.
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// TOML configuration for the emulator settings.
    #[arg(short, long)]
    config: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct ExchangeRecord {
    line: usize,
    request: String,
    gcodes: String,
    response: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct JsonRecord<'a> {
    timestamp: DateTime<Utc>,
    module: ModuleKind,
    #[serde(flatten)]
    exchange: &'a ExchangeRecord,
}

/// Runs one request through the emulator. Failures become part of the record.
fn exchange(emulator: &mut dyn ModuleEmulator, line_number: usize, request: &str) -> ExchangeRecord {
    let gcodes = parse_line(request)
        .map(|commands| commands.iter().map(|c| c.gcode().to_string()).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let (response, error) = match emulator.handle(request) {
        Ok(response) => (response.unwrap_or_default(), String::new()),
        Err(e) => {
            tracing::warn!(line = line_number, error = %e, "request failed");
            (String::new(), e.to_string())
        }
    };
    ExchangeRecord {
        line: line_number,
        request: request.to_string(),
        gcodes,
        response,
        error,
    }
}

fn replay<R: BufRead>(
    emulator: &mut dyn ModuleEmulator,
    reader: R,
    wtr: &mut Writer<File>,
    jsonl: &mut Option<File>,
) -> Result<usize, HarnessError> {
    let module = emulator.kind();
    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let request = line.trim();
        if request.is_empty() || request.starts_with(';') {
            continue;
        }
        let record = exchange(emulator, index + 1, request);
        wtr.serialize(&record)?;
        if let Some(jsonl) = jsonl {
            let json = serde_json::to_string(&JsonRecord {
                timestamp: Utc::now(),
                module,
                exchange: &record,
            })?;
            writeln!(jsonl, "{}", json)?;
        }
        count += 1;
    }
    wtr.flush()?;
    Ok(count)
}

fn main() -> Result<(), HarnessError> {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let mut emulator = build_emulator(cli.module, &config);

    tracing::info!("Replaying {} through {}", cli.input.display(), cli.module);
    let reader = BufReader::new(File::open(&cli.input)?);
    let mut wtr = Writer::from_path(&cli.output)?;
    let mut jsonl_file = match &cli.jsonl {
        Some(path) => Some(File::create(path)?),
        None => None,
    };
    let count = replay(emulator.as_mut(), reader, &mut wtr, &mut jsonl_file)?;
    tracing::info!("Wrote {} exchanges to {}", count, cli.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_exchange_records_error_text() {
        let mut emulator = build_emulator(ModuleKind::TempDeck, &Config::default());
        let record = exchange(emulator.as_mut(), 3, "M104");
        assert_eq!(record.gcodes, "M104");
        assert!(record.response.is_empty());
        assert!(record.error.contains("missing required parameter 'S'"));
    }

    #[test]
    fn test_replay_writes_csv_and_jsonl() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let jsonl_path = dir.path().join("out.jsonl");
        let input = "; warm up\nM104 S40\n\nM105 M115\nM104 S#\n";

        let mut emulator = build_emulator(ModuleKind::TempDeck, &Config::default());
        let mut wtr = Writer::from_path(&csv_path).unwrap();
        let mut jsonl = Some(File::create(&jsonl_path).unwrap());
        let count = replay(emulator.as_mut(), Cursor::new(input), &mut wtr, &mut jsonl).unwrap();
        assert_eq!(count, 3);
        drop(jsonl);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "2");
        assert_eq!(&rows[1][2], "M105 M115");
        assert!(rows[1][3].starts_with("T:40 C:23 serial:"));
        assert!(!rows[2][4].is_empty());

        let jsonl = std::fs::read_to_string(&jsonl_path).unwrap();
        let first: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
        assert_eq!(first["module"], "temp-deck");
        assert_eq!(first["line"], 2);
        assert!(first["timestamp"].is_string());
    }
}
