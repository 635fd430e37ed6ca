use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer};
use clap::Parser;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;

use bookshelf_repository::app_config::config_app;
use bookshelf_repository::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
};
use bookshelf_repository::settings::{Settings, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use bookshelf_repository::telemetry::init_telemetry;

#[derive(Parser, Debug)]
#[command(about = "Serves the bookshelf books and comments API")]
struct Args {
    /// Configuration file, environment variables prefixed with BOOKSHELF__ override it
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_telemetry("bookshelf_repository");

    let settings = Settings::load(&args.config)?;

    let books_repository: Arc<dyn BookRepository> = if settings.use_in_memory_db {
        tracing::info!("Using in-memory books repository");
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(PostgresBooksRepository::init(settings.database.repository_config()).await?)
    };

    tracing::info!(
        "starting HTTP server at http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(web::Data::new(books_repository.clone()))
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await?;

    Ok(())
}
