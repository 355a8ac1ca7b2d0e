//! CLI argument parsing for rowstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rowstore")]
#[command(author, version, about = "Inspect a bizdesk row store", long_about = None)]
pub struct Cli {
    /// Store directory (default: platform data dir)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List collections and their row counts
    Collections,

    /// Print every row of a collection as JSON lines
    Dump {
        /// Collection name
        #[arg(required = true)]
        collection: String,
    },

    /// Print one row
    Get {
        /// Collection name
        #[arg(required = true)]
        collection: String,

        /// Row id
        #[arg(required = true)]
        id: String,
    },

    /// Delete one row
    Delete {
        /// Collection name
        #[arg(required = true)]
        collection: String,

        /// Row id
        #[arg(required = true)]
        id: String,
    },
}

/// Default store location shared with the `bd` binary
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bizdesk")
        .join("store")
}
