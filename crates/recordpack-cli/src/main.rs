//! CLI tool for inspecting persisted record packs.

mod error;

use std::path::{Path, PathBuf};

use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use snafu::ResultExt;

use recordpack_core::{codec, storage::RecordLocation};

use crate::error::{CliResult, ReadPackSnafu, ReadTableSnafu, RenderMetadataSnafu, RenderSnafu};

#[derive(Debug, Parser)]
#[command(name = "rpack", about = "Inspect record packs (metadata.json + per-field parquet)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the metadata document and a summary of each tabular artifact
    Inspect {
        /// Record pack directory
        #[arg(long)]
        location: PathBuf,
    },

    /// Pretty-print rows of one tabular field
    Table {
        /// Record pack directory
        #[arg(long)]
        location: PathBuf,

        /// Tabular field name (artifact stem)
        #[arg(long)]
        field: String,

        /// Maximum number of rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Inspect { location } => cmd_inspect(&location).await,
        Command::Table {
            location,
            field,
            limit,
        } => cmd_table(&location, &field, limit).await,
    }
}

async fn cmd_inspect(path: &Path) -> CliResult<()> {
    let location = RecordLocation::local(path);
    let location_str = path.display().to_string();

    let document = codec::read_metadata_document(&location)
        .await
        .context(ReadPackSnafu {
            location: location_str.clone(),
        })?;
    let rendered = serde_json::to_string_pretty(&document).context(RenderMetadataSnafu)?;
    println!("{rendered}");

    let artifacts = codec::read_tabular_artifacts(&location)
        .await
        .context(ReadPackSnafu {
            location: location_str,
        })?;
    for (field, batch) in artifacts {
        println!();
        println!("{field}: {} rows", batch.num_rows());
        for column in batch.schema().fields() {
            println!("  {}: {}", column.name(), column.data_type());
        }
    }

    Ok(())
}

async fn cmd_table(path: &Path, field: &str, limit: usize) -> CliResult<()> {
    let location = RecordLocation::local(path);

    let batch = codec::read_tabular_artifact(&location, field)
        .await
        .context(ReadTableSnafu {
            location: path.display().to_string(),
            field,
        })?;

    let shown = batch.slice(0, limit.min(batch.num_rows()));
    let rendered = pretty_format_batches(&[shown]).context(RenderSnafu)?;
    println!("{rendered}");

    if batch.num_rows() > limit {
        println!("({} of {} rows shown)", limit, batch.num_rows());
    }

    Ok(())
}
