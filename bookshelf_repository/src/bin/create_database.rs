//! Creates every table the bookshelf repository needs, then exits.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use bookshelf_repository::books_repository::{create_schema, postgres_connect};
use bookshelf_repository::settings::{Settings, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use bookshelf_repository::telemetry::init_logging;

#[derive(Parser, Debug)]
#[command(about = "Creates the books and comments tables")]
struct Args {
    /// Configuration file with the database connection parameters
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging("create_database");

    let settings = Settings::load(&args.config)?;
    let client = postgres_connect(&settings.database.repository_config()).await?;
    create_schema(&client)
        .await
        .context("Failed to create tables")?;

    tracing::info!("All tables created");
    Ok(())
}
