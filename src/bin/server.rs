use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use foodgram_backend::commands::import_ingredients;
use foodgram_backend::db::schema::ensure_schema;
use foodgram_backend::server::config::ServerConfig;
use foodgram_backend::services::auth_service;
use foodgram_backend::web::create_axum_router;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Load reference ingredients from a `name,measurement_unit` CSV file
    ImportIngredients {
        /// CSV file to import
        csv: PathBuf,
    },
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn connect(config: &ServerConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opt = ConnectOptions::new(config.database_url.to_owned());
    opt.max_connections(config.db_max_connections)
        .sqlx_logging(false);
    Database::connect(opt).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // --- Server Config Setup ---
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting foodgram server, version: {}", env!("CARGO_PKG_VERSION"));

    // --- Database Pool Setup ---
    let db_pool = match connect(&server_config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to the database: {}", e);
            return Err(e.into());
        }
    };
    ensure_schema(&db_pool).await?;
    auth_service::purge_expired_tokens(&db_pool).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::ImportIngredients { csv } => {
            let summary = import_ingredients::run(&db_pool, &csv).await.map_err(|e| {
                error!("Ingredient import failed: {}", e);
                e
            })?;
            info!(
                inserted = summary.inserted,
                skipped = summary.skipped,
                "Ingredient import complete."
            );
        }
        Command::Serve => {
            let app = create_axum_router(db_pool, server_config.clone());
            let listener = tokio::net::TcpListener::bind(&server_config.bind_address).await?;
            info!("HTTP API listening on {}", server_config.bind_address);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}
