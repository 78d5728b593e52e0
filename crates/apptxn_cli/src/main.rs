//! apptxn CLI
//!
//! Command-line tools for apptxn transaction stores.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and stored transactions
//! - `create` - Create a transaction
//! - `log` - Log an event against a transaction
//! - `delete` - Delete one transaction and its logs
//! - `purge` - Delete every transaction
//! - `export` - Print the payloads a flush would send

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// apptxn command-line store tools.
#[derive(Parser)]
#[command(name = "apptxn")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and stored transactions
    Inspect {
        /// Also list every log entry
        #[arg(short, long)]
        logs: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Create a transaction
    Create {
        /// Use-case tag
        #[arg(short, long)]
        usecase: i64,

        /// Guid to use instead of a generated one
        #[arg(short, long)]
        guid: Option<String>,

        /// Device make
        #[arg(long, default_value = "cli")]
        make: String,

        /// Device operating system
        #[arg(long, default_value = std::env::consts::OS)]
        os: String,

        /// Device operating system version
        #[arg(long, default_value = "")]
        os_version: String,
    },

    /// Log an event against a transaction
    Log {
        /// Guid of the transaction
        #[arg(short, long)]
        guid: String,

        /// Use-case event tag
        #[arg(short, long)]
        event: i64,

        /// In-context error code
        #[arg(long, requires = "err_desc")]
        err_code: Option<i64>,

        /// In-context error description
        #[arg(long, requires = "err_code")]
        err_desc: Option<String>,
    },

    /// Delete one transaction and its logs
    Delete {
        /// Guid of the transaction
        #[arg(short, long)]
        guid: String,
    },

    /// Delete every transaction and log
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },

    /// Print the JSON payloads a flush would send, one per line
    Export,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { logs, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, logs, format)?;
        }
        Commands::Create {
            usecase,
            guid,
            make,
            os,
            os_version,
        } => {
            let path = cli.path.ok_or("Store path required for create")?;
            commands::record::create(&path, usecase, guid, &make, &os, &os_version)?;
        }
        Commands::Log {
            guid,
            event,
            err_code,
            err_desc,
        } => {
            let path = cli.path.ok_or("Store path required for log")?;
            commands::record::log(&path, &guid, event, err_code.zip(err_desc))?;
        }
        Commands::Delete { guid } => {
            let path = cli.path.ok_or("Store path required for delete")?;
            commands::maintenance::delete(&path, &guid)?;
        }
        Commands::Purge { yes } => {
            let path = cli.path.ok_or("Store path required for purge")?;
            if !yes {
                return Err("Refusing to purge without --yes".into());
            }
            commands::maintenance::purge(&path)?;
        }
        Commands::Export => {
            let path = cli.path.ok_or("Store path required for export")?;
            commands::export::run(&path)?;
        }
        Commands::Version => {
            println!("apptxn CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("apptxn Core v{}", apptxn_core::VERSION);
            println!("Schema version {}", apptxn_core::schema::SCHEMA_VERSION);
        }
    }

    Ok(())
}
