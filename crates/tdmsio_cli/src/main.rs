//! tdmsio CLI
//!
//! Command-line tools for TDMS files.
//!
//! # Commands
//!
//! - `inspect` - List groups, channels and properties
//! - `dump` - Print the values of one channel
//! - `verify` - Index every segment and report damage
//! - `generate` - Write demonstration files

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// TDMS file tools.
#[derive(Parser)]
#[command(name = "tdmsio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for `inspect`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    /// Human-readable listing
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Demonstration file layouts for `generate`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Kind {
    /// Two groups, four channels, one segment
    Basic,
    /// Two channels of different types in one interleaved segment
    Interleaved,
    /// Metadata segment followed by many data segments
    Large,
}

#[derive(Subcommand)]
enum Commands {
    /// List groups, channels and properties
    Inspect {
        /// TDMS file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Also print the first N values of each channel
        #[arg(long)]
        values: Option<u64>,
    },

    /// Print the values of one channel
    Dump {
        /// TDMS file
        file: PathBuf,

        /// Group name
        group: String,

        /// Channel name
        channel: String,

        /// First value to print
        #[arg(long, default_value = "0")]
        start: u64,

        /// One past the last value to print (defaults to the channel length)
        #[arg(long)]
        stop: Option<u64>,
    },

    /// Index every segment and report damage
    Verify {
        /// TDMS file
        file: PathBuf,
    },

    /// Write a demonstration file
    Generate {
        /// Output file
        file: PathBuf,

        /// Which file to write
        #[arg(short, long, value_enum, default_value = "basic")]
        kind: Kind,

        /// Data segments to write (large only)
        #[arg(long, default_value = "100")]
        chunks: u64,

        /// Values per channel in each data segment (large only)
        #[arg(long, default_value = "100000")]
        chunk_size: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect {
            file,
            format,
            values,
        } => commands::inspect::run(&file, format, values)?,
        Commands::Dump {
            file,
            group,
            channel,
            start,
            stop,
        } => commands::dump::run(&file, &group, &channel, start, stop)?,
        Commands::Verify { file } => commands::verify::run(&file)?,
        Commands::Generate {
            file,
            kind,
            chunks,
            chunk_size,
        } => commands::generate::run(&file, kind, chunks, chunk_size)?,
    }

    Ok(())
}
