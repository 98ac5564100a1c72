//! Whelk CLI - drive a project session from the terminal
//!
//! Usage:
//!   whelk -c "command"                 Execute one command line
//!   whelk --project app.json           Read command lines from stdin
//!   whelk --project app.json --save app.json -c "npm install zod"

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use whelk::{CommandResult, FileStore, ResourceLimits, execute_command};

/// Whelk - in-memory project filesystem with a bash-like shell
#[derive(Parser, Debug)]
#[command(name = "whelk")]
#[command(about = "Run shell commands against an in-memory project")]
struct Args {
    /// JSON object of path -> content to seed the session with
    #[arg(long)]
    project: Option<PathBuf>,

    /// Write the final files back as a JSON object of path -> content
    #[arg(long)]
    save: Option<PathBuf>,

    /// JSON file with resource limits
    #[arg(long)]
    limits: Option<PathBuf>,

    /// Command line to execute; stdin is read line by line when absent
    #[arg(short = 'c')]
    command: Option<String>,
}

fn load_limits(path: Option<&Path>) -> anyhow::Result<ResourceLimits> {
    let Some(path) = path else {
        return Ok(ResourceLimits::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading limits from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing limits in {}", path.display()))
}

fn load_store(project: Option<&Path>, limits: ResourceLimits) -> anyhow::Result<FileStore> {
    let Some(path) = project else {
        return Ok(FileStore::with_limits(limits));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading project from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing project in {}", path.display()))?;
    let store = FileStore::from_json_with_limits(&value, limits)
        .with_context(|| format!("loading project from {}", path.display()))?;
    tracing::debug!("Loaded {} files from {}", store.len(), path.display());
    Ok(store)
}

fn save_store(store: &FileStore, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(&store.to_json())?;
    std::fs::write(path, text).with_context(|| format!("saving project to {}", path.display()))?;
    tracing::debug!("Saved {} files to {}", store.len(), path.display());
    Ok(())
}

/// Print a result the way a terminal would, one trailing newline per stream.
fn emit(result: &CommandResult, out: &mut impl Write, err: &mut impl Write) -> std::io::Result<()> {
    if !result.stdout.is_empty() {
        writeln!(out, "{}", result.stdout)?;
    }
    if !result.stderr.is_empty() {
        writeln!(err, "{}", result.stderr)?;
    }
    out.flush()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never mix with command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let limits = load_limits(args.limits.as_deref())?;
    let mut store = load_store(args.project.as_deref(), limits)?;

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut exit_code = 0;

    if let Some(command) = &args.command {
        let result = execute_command(command, &mut store);
        emit(&result, &mut stdout.lock(), &mut stderr.lock())?;
        exit_code = result.exit_code;
    } else {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let result = execute_command(line, &mut store);
            emit(&result, &mut stdout.lock(), &mut stderr.lock())?;
            exit_code = result.exit_code;
        }
    }

    if let Some(path) = &args.save {
        save_store(&store, path)?;
    }

    std::process::exit(exit_code);
}
