//! CLI command for change-log export

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::audit::ChangeLogStore;
use crate::error::{LoggableError, LoggableResult};
use crate::export::{csv, json, yaml};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// JSON with schema version and metadata
    Json,
    /// YAML, human-readable
    Yaml,
    /// CSV, one row per record
    Csv,
}

/// Export arguments
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Export format
    #[arg(value_enum)]
    pub format: ExportFormat,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include soft-deleted records
    #[arg(short, long)]
    pub all: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Handle the export command
pub fn handle_export_command(store: &dyn ChangeLogStore, args: ExportArgs) -> LoggableResult<()> {
    match &args.output {
        Some(output) => {
            let file = File::create(output).map_err(|e| {
                LoggableError::Export(format!(
                    "Failed to create file {}: {}",
                    output.display(),
                    e
                ))
            })?;
            let mut writer = BufWriter::new(file);
            write_export(store, &args, &mut writer)?;
            writer
                .flush()
                .map_err(|e| LoggableError::Export(e.to_string()))?;
            println!("Change log exported to: {}", output.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_export(store, &args, &mut writer)?;
            if args.format == ExportFormat::Json {
                writeln!(writer).map_err(|e| LoggableError::Export(e.to_string()))?;
            }
        }
    }

    Ok(())
}

fn write_export<W: Write>(
    store: &dyn ChangeLogStore,
    args: &ExportArgs,
    writer: &mut W,
) -> LoggableResult<()> {
    match args.format {
        ExportFormat::Json => json::export_changelog_json(store, writer, args.all, args.pretty),
        ExportFormat::Yaml => yaml::export_changelog_yaml(store, writer, args.all),
        ExportFormat::Csv => csv::export_changelog_csv(store, writer, args.all),
    }
}
