//! Registers newline-delimited JSON documents read from stdin and prints one
//! identifier per input line. Blank lines are skipped.
//!
//! ```text
//! json-register [CONFIG.yaml] [--init-schema] [--batch N]
//! ```
//!
//! Without a config file the registry is in-memory, which is only useful for
//! checking which lines are duplicates of each other. Logs go to stderr and
//! are filtered through `RUST_LOG` (default `info`).

use std::error::Error;
use std::io::{self, BufRead, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use json_register::{ObjectId, RawJson, RegisterConfig, Registry, StoreGateway};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "json-register")]
#[command(version, about = "Register NDJSON documents and print their ids", long_about = None)]
struct Args {
    /// YAML configuration file; in-memory store when omitted
    config: Option<PathBuf>,

    /// Create the table before registering
    #[arg(long)]
    init_schema: bool,

    /// Documents sent to the store per round trip
    #[arg(long, default_value = "1")]
    batch: NonZeroUsize,
}

fn open_registry(args: &Args) -> Result<(RegisterConfig, Registry), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => RegisterConfig::from_file(path)?,
        None => RegisterConfig::in_memory(),
    };

    if args.init_schema {
        config
            .backend_config()?
            .create_schema(&config.table)?;
        tracing::info!(table = %config.table.name, "schema_ready");
    }

    let registry = Registry::open(&config)?;
    Ok((config, registry))
}

fn flush_batch<S: StoreGateway>(
    registry: &Registry<S>,
    lines: &mut Vec<String>,
    out: &mut impl Write,
) -> Result<usize, Box<dyn Error>> {
    if lines.is_empty() {
        return Ok(0);
    }
    let documents: Vec<RawJson<'_>> = lines.iter().map(RawJson::from).collect();
    let ids: Vec<ObjectId> = if documents.len() == 1 {
        vec![registry.register(&documents[0])?]
    } else {
        registry.register_batch(&documents)?
    };
    for id in &ids {
        writeln!(out, "{id}")?;
    }
    lines.clear();
    Ok(ids.len())
}

/// Registers every non-blank line of `input`, writing one id per line to
/// `out` in input order. Returns the number of documents registered.
fn register_lines<S: StoreGateway>(
    registry: &Registry<S>,
    input: impl BufRead,
    out: &mut impl Write,
    batch: NonZeroUsize,
) -> Result<usize, Box<dyn Error>> {
    let mut pending = Vec::with_capacity(batch.get());
    let mut registered = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        pending.push(line);
        if pending.len() >= batch.get() {
            registered += flush_batch(registry, &mut pending, out)?;
        }
    }
    registered += flush_batch(registry, &mut pending, out)?;
    out.flush()?;
    Ok(registered)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let (config, registry) = open_registry(&args)?;
    tracing::info!(
        backend = %config.store.backend,
        cache_capacity = config.cache.capacity,
        batch = args.batch.get(),
        "registry_ready"
    );

    let stdin = io::stdin();
    let mut out = BufWriter::new(io::stdout().lock());
    let registered = register_lines(&registry, stdin.lock(), &mut out, args.batch)?;
    tracing::info!(registered, "input_exhausted");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "json_register_failed");
            ExitCode::FAILURE
        }
    }
}
