use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "chatguard")]
#[command(about = "Policy-enforcement gateway for outbound AI chat messages")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "chatguard.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway HTTP server
    Serve,
    /// Show decision statistics from the audit log
    Status,
    /// View audit log records
    Logs {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export all records instead of printing a table
        #[arg(long)]
        export: bool,
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
    /// Write a default configuration file
    Init,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}
