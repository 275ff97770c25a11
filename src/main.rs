use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crm_insights::{
    clock::{Clock, SystemClock},
    config::{Config, LogFormat},
    sentiment::{HttpSentimentClient, SentimentAnalyzer},
    server::{AppState, McpServer},
    services::{HealthService, ServiceCore},
    storage::SqliteStorage,
};

#[derive(Debug, Parser)]
#[command(name = "crm-insights", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve MCP tools over stdio (default)
    Serve,
    /// Recalculate health scores and print a summary
    RecalculateHealth {
        /// Only recalculate this contact
        #[arg(long)]
        contact_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CRM insights starting..."
    );

    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, storage).await,
        Command::RecalculateHealth { contact_id } => {
            recalculate_health(storage, contact_id.as_deref()).await
        }
    }
}

async fn serve(config: Config, storage: SqliteStorage) -> anyhow::Result<()> {
    let sentiment: Option<Arc<dyn SentimentAnalyzer>> =
        match HttpSentimentClient::from_config(&config.sentiment) {
            Ok(Some(client)) => {
                info!("Sentiment enrichment enabled");
                Some(Arc::new(client))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Sentiment client unavailable, continuing without it");
                None
            }
        };

    let state = Arc::new(AppState::new(config, storage, sentiment));
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn recalculate_health(storage: SqliteStorage, contact_id: Option<&str>) -> anyhow::Result<()> {
    let health = HealthService::new(ServiceCore::new(storage));
    let now = SystemClock.now();

    match contact_id {
        Some(id) => {
            let score = health.calculate(id, now).await?;
            println!("{}", serde_json::to_string_pretty(&score)?);
        }
        None => {
            let summary = health.recalculate_all(now).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.failures.is_empty() {
                anyhow::bail!("{} contact(s) failed", summary.failures.len());
            }
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
