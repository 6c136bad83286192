use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use user_service::api::{self, AppState};
use user_service::config::AppConfig;
use user_service::store::{self, PgStore};
use user_service::utils;

#[derive(Parser)]
#[command(name = "user-service", version, about = "User accounts API server")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    let config = AppConfig::from_file(&args.config)?;

    match args.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let pool = store::connect(&config.database_url, config.db_max_connections).await?;
            store::migrate(&pool).await?;

            let pg_store = PgStore::new(pool, Duration::from_secs(config.tx_deadline_secs));
            let state = Arc::new(AppState::new(&config, Arc::new(pg_store)));

            let port = port.unwrap_or(config.port);
            info!("starting API server on port {port}");
            api::serve(state, port).await?;
        }
        Commands::Migrate => {
            let pool = store::connect(&config.database_url, config.db_max_connections).await?;
            store::migrate(&pool).await?;
            info!("migrations applied");
        }
    }

    Ok(())
}
