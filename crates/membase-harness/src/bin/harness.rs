//! CLI entrypoint for the membase harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use membase_core::{HeapLogLevel, ValidationLevel};
use membase_harness::structured_log::{LogEmitter, LogEntry, LogLevel, validate_log_file};
use membase_harness::{LayoutReport, RunConfig, StormRunner, StormType};

/// Allocation-storm tooling for membase.
#[derive(Debug, Parser)]
#[command(name = "membase-harness")]
#[command(about = "Deterministic workload runner and log tooling for the membase allocator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a deterministic allocation storm against the engine.
    Run {
        /// Workload shape.
        #[arg(long, value_enum, default_value = "mixed")]
        storm: StormType,
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Number of operations.
        #[arg(long, default_value_t = 10_000)]
        ops: usize,
        /// Pages committed before the engine starts.
        #[arg(long, default_value_t = 1)]
        initial_pages: usize,
        /// Host growth ceiling in pages.
        #[arg(long, default_value_t = 1024)]
        max_pages: usize,
        /// Pointer validation (`strict` or `off`).
        #[arg(long, default_value = "strict")]
        validation: String,
        /// Check heap invariants every N ops (0 = only at the end).
        #[arg(long, default_value_t = 64)]
        check_every: usize,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Minimum engine record level written to the log.
        #[arg(long, default_value = "info")]
        log_level: String,
        /// Output path for the JSON report (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a structured JSONL log file.
    VerifyLog {
        /// Log file path.
        #[arg(long)]
        log: PathBuf,
    },
    /// Print page, chunk and size-class geometry as JSON.
    Layout {
        /// Output path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            storm,
            seed,
            ops,
            initial_pages,
            max_pages,
            validation,
            check_every,
            log,
            log_level,
            output,
        } => {
            let seed = parse_seed(&seed)?;
            let config = RunConfig {
                storm,
                seed,
                ops,
                initial_pages,
                max_pages,
                validation: ValidationLevel::from_str_loose(&validation),
                log_level: log.as_ref().and(parse_log_level(&log_level)?),
                check_every,
            };
            eprintln!("Running {storm} storm: seed={seed:#x} ops={ops}");
            let run = StormRunner::new(config).run()?;
            let report = &run.report;
            eprintln!(
                "Storm complete: allocations={}, releases={}, reallocations={}, oom={}, heap_size={}",
                report.allocations,
                report.releases,
                report.reallocations,
                report.out_of_memory,
                report.counters.heap_size,
            );

            if let Some(path) = log {
                let run_id = format!("{storm}-{seed:016x}");
                let mut emitter = LogEmitter::to_file(&path, &run_id)?;
                emitter.emit(LogLevel::Info, "run_start")?;
                emitter.emit_heap_records(&run.records)?;
                emitter.emit_entry(
                    LogEntry::new(String::new(), LogLevel::Info, "run_complete")
                        .with_outcome("pass")
                        .with_counters(report.counters),
                )?;
                emitter.flush()?;
                eprintln!("Wrote {} engine records to {}", run.records.len(), path.display());
            }

            let json = serde_json::to_string_pretty(report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Wrote report to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::VerifyLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            if !errors.is_empty() {
                return Err(format!(
                    "{} validation error(s) in {} line(s) of {}",
                    errors.len(),
                    lines,
                    log.display()
                )
                .into());
            }
            eprintln!("{}: {lines} line(s) valid", log.display());
        }
        Command::Layout { output } => {
            let json = LayoutReport::current().to_json()?;
            match output {
                Some(path) => std::fs::write(&path, json)?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn parse_seed(raw: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let s = raw.trim();
    let seed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let hex = hex.replace('_', "");
        u64::from_str_radix(&hex, 16)?
    } else {
        let dec = s.replace('_', "");
        dec.parse::<u64>()?
    };
    Ok(seed)
}

fn parse_log_level(raw: &str) -> Result<Option<HeapLogLevel>, Box<dyn std::error::Error>> {
    let level = match raw.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => None,
        "trace" => Some(HeapLogLevel::Trace),
        "debug" => Some(HeapLogLevel::Debug),
        "info" => Some(HeapLogLevel::Info),
        "warn" => Some(HeapLogLevel::Warn),
        "error" => Some(HeapLogLevel::Error),
        other => return Err(format!("unknown log level: '{other}'").into()),
    };
    Ok(level)
}
