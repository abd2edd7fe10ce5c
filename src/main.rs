//! tablestream - inspect and reformat table-set JSON documents

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tablestream::config::{Config, OutputStyle};
use tablestream::{ColumnType, TableSet};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputStyle {
    Compact,
    Pretty,
}

impl From<CliOutputStyle> for OutputStyle {
    fn from(s: CliOutputStyle) -> Self {
        match s {
            CliOutputStyle::Compact => OutputStyle::Compact,
            CliOutputStyle::Pretty => OutputStyle::Pretty,
        }
    }
}

/// Streaming codec for typed table-set JSON documents
#[derive(Parser, Debug)]
#[command(name = "tablestream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a document and summarize its tables
    Inspect {
        /// Table-set document to read
        file: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a document and encode it again
    Reformat {
        /// Table-set document to read
        file: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output layout
        #[arg(short, long, value_enum, default_value = "compact")]
        style: CliOutputStyle,

        /// Only flush once, at the end of the document
        #[arg(long)]
        no_boundary_flush: bool,
    },
}

#[derive(Serialize)]
struct TableSummary<'a> {
    name: &'a str,
    columns: Vec<(&'a str, ColumnType)>,
    rows: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { file, json } => {
            let tables = read_tables(&file)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            if json {
                let summary: Vec<_> = tables.tables().iter().map(summarize).collect();
                serde_json::to_writer_pretty(&mut out, &summary)?;
                writeln!(out)?;
            } else {
                for table in &tables {
                    let columns: Vec<String> = table
                        .columns()
                        .iter()
                        .map(|c| format!("{}:{}", c.name, c.column_type))
                        .collect();
                    writeln!(
                        out,
                        "{}\t{} rows\t{}",
                        table.name(),
                        table.row_count(),
                        columns.join(", ")
                    )?;
                }
            }
        }
        Command::Reformat {
            file,
            output,
            style,
            no_boundary_flush,
        } => {
            let tables = read_tables(&file)?;
            let config = Config::new()
                .with_style(style.into())
                .with_flush_at_boundaries(!no_boundary_flush);

            match output {
                Some(path) => {
                    let out = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    tablestream::to_writer(BufWriter::new(out), &tables, &config)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(output = %path.display(), tables = tables.len(), "reformatted");
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    tablestream::to_writer(&mut out, &tables, &config)
                        .context("Failed to write to stdout")?;
                    writeln!(out)?;
                }
            }
        }
    }

    Ok(())
}

fn read_tables(path: &Path) -> Result<TableSet> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let tables = tablestream::from_reader(file)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    info!(file = %path.display(), tables = tables.len(), "decoded");
    Ok(tables)
}

fn summarize(table: &tablestream::Table) -> TableSummary<'_> {
    TableSummary {
        name: table.name(),
        columns: table
            .columns()
            .iter()
            .map(|c| (c.name.as_str(), c.column_type))
            .collect(),
        rows: table.row_count(),
    }
}
