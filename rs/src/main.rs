use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use rowstore::Store;
use rowstore::cli::{Cli, Command, default_store_path};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let store_path = cli.store.unwrap_or_else(default_store_path);
    info!("rowstore opening {}", store_path.display());

    match cli.command {
        Command::Collections => {
            let store = Store::open(&store_path)?;
            let stats = store.collections()?;
            if stats.is_empty() {
                println!("No collections found");
            } else {
                for s in stats {
                    println!("{} {}", s.name.cyan(), s.rows.to_string().dimmed());
                }
            }
        }
        Command::Dump { collection } => {
            let store = Store::open(&store_path)?;
            for row in store.list_documents(&collection, &[])? {
                println!("{}", row);
            }
        }
        Command::Get { collection, id } => {
            let store = Store::open(&store_path)?;
            match store.get_document(&collection, &id)? {
                Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
                None => {
                    eprintln!("{} Not found: {}/{}", "✗".red(), collection, id);
                    std::process::exit(1);
                }
            }
        }
        Command::Delete { collection, id } => {
            let mut store = Store::open(&store_path)?;
            if store.delete_document(&collection, &id)? {
                println!("{} Deleted {}/{}", "✓".green(), collection, id);
            } else {
                println!("Nothing to delete: {}/{}", collection, id);
            }
        }
    }

    Ok(())
}
