//! Auzolan server binary

use anyhow::{Context, Result};
use auzolan_core::{
    api::{ApiServer, AppState},
    auth::PasswordHasher,
    seed,
    services::accounts,
    AppConfig, Storage,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "auzolan")]
#[command(about = "Community mutual-aid backend", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./auzolan.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides the configured one)
    #[arg(long, global = true, env = "AUZOLAN_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and start the HTTP API
    Serve {
        /// Listen address (overrides the configured one)
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Load the demo community, users, requests and loans
    SeedDemo,

    /// Create a superadmin, or promote an existing account
    CreateSuperadmin {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        display_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!(
        "auzolan={level},auzolan_core={level},tower_http={level}",
        level = level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Auzolan v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }

    let storage = Arc::new(
        Storage::open(&config.database.path, config.database.pool_size)
            .context("Failed to open database")?,
    );
    storage.run_migrations().await?;

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            let state = AppState::new(storage, &config);
            ApiServer::new(&config.server, state).serve().await
        }
        Commands::Migrate => {
            info!("Database ready at {}", storage.path().display());
            Ok(())
        }
        Commands::SeedDemo => {
            let hasher = PasswordHasher::new(config.auth.password_iterations);
            let summary = seed::seed_demo(&storage, hasher).await?;
            println!(
                "Demo data loaded: {} users, {} requests, {} reports, {} loan items (community #{})",
                summary.users, summary.requests, summary.reports, summary.loans, summary.community_id
            );
            Ok(())
        }
        Commands::CreateSuperadmin {
            email,
            password,
            display_name,
        } => {
            let hasher = PasswordHasher::new(config.auth.password_iterations);
            let user_id = accounts::create_superadmin(
                &storage,
                hasher,
                &email,
                &password,
                display_name.as_deref(),
            )
            .await?;
            println!("Superadmin ready: {} (id {})", email, user_id);
            Ok(())
        }
    }
}
