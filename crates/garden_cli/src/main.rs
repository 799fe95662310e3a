//! Operator CLI for a garden database.
//!
//! # Responsibility
//! - Smoke-probe `garden_core` linkage (`ping`).
//! - Query the feed and bulk import/export items without the HTTP server.

use clap::{Parser, Subcommand};
use garden_core::db::open_db;
use garden_core::{
    init_logging, FeedParams, FeedService, Item, ItemKind, ItemListQuery, ItemService,
    SqliteItemRepository,
};
use log::info;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "garden: timeline garden item store", long_about = None)]
struct Cli {
    /// Log level for stderr diagnostics.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print core ping and version.
    Ping,
    /// Print one feed page as JSON.
    Feed {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        order: Option<String>,
        /// Kept as text so bad values normalize instead of failing.
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        start: Option<String>,
    },
    /// Upsert items from a JSON array file.
    Import {
        #[arg(long)]
        db: PathBuf,
        file: PathBuf,
    },
    /// Print non-deleted items as a JSON array.
    Export {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<ItemKind>,
    },
}

fn parse_kind(raw: &str) -> Result<ItemKind, String> {
    ItemKind::parse(raw).ok_or_else(|| format!("unknown item kind `{raw}` (note|task|contact)"))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, None)?;
    run(cli.command)
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Ping => {
            println!("garden_core ping={}", garden_core::ping());
            println!("garden_core version={}", garden_core::core_version());
        }
        Commands::Feed {
            db,
            sort,
            order,
            limit,
            start,
        } => {
            let conn = open_db(&db)?;
            let repo = SqliteItemRepository::try_new(&conn)?;
            let params = FeedParams {
                sort,
                order,
                limit,
                start,
            };
            let response = FeedService::new(repo).feed(&params)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Import { db, file } => {
            let raw = fs::read_to_string(&file)?;
            let items: Vec<Item> = serde_json::from_str(&raw)?;
            let conn = open_db(&db)?;
            let repo = SqliteItemRepository::try_new(&conn)?;
            let summary = ItemService::new(repo).import_items(items)?;
            info!(
                "event=cli_import module=cli status=ok file={}",
                file.display()
            );
            println!("created={} updated={}", summary.created, summary.updated);
        }
        Commands::Export { db, kind } => {
            let conn = open_db(&db)?;
            let repo = SqliteItemRepository::try_new(&conn)?;
            let query = ItemListQuery {
                kind,
                ..ItemListQuery::active()
            };
            let items = ItemService::new(repo).list(&query)?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}
