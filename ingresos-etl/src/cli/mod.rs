//! Command-line interface

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ingresos-etl")]
#[command(about = "Load the quarterly \"Ingresos Detallado\" report into PostgreSQL or SQLite", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/ingresos-etl/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract, transform and load one quarterly report
    Run(RunArgs),

    /// Extract and transform a report without loading it
    Inspect(InspectArgs),

    /// Print the surrogate key for a business key
    Key {
        concepto: String,
        /// DD/MM/YYYY, may be empty
        fecha: String,
        /// 1-4, may be empty
        cuarto: String,
    },

    /// Print the DDL of the target table
    Schema,
}

/// Which report to read
#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    /// Fiscal year of the report
    #[arg(short, long)]
    pub year: i32,

    /// Quarter: Q1-Q4 (or 1T-4T)
    #[arg(short, long)]
    pub quarter: String,

    /// Extraction source
    #[arg(long, default_value = "s3")]
    pub source: String,

    /// Bucket holding the raw reports (overrides config)
    #[arg(short, long)]
    pub bucket: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub report: ReportArgs,

    /// insert, upsert or overwrite
    #[arg(short, long, default_value = "upsert")]
    pub method: String,

    /// Database URL (overrides config)
    #[arg(long)]
    pub database: Option<String>,

    /// Target table (overrides config)
    #[arg(long)]
    pub table: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub report: ReportArgs,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}
