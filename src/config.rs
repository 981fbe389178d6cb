//! Layered configuration for the Auzolan server
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. Optional TOML file (`auzolan.toml` unless `--config` says otherwise)
//! 3. Environment variables prefixed with `AUZOLAN_`, using `__` between
//!    section and key (e.g. `AUZOLAN_AUTH__SECRET`)

use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable prefix
const ENV_PREFIX: &str = "AUZOLAN";

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "auzolan.toml";

const DEFAULTS: &str = r#"
[server]
addr = "127.0.0.1:8000"
cors_permissive = true

[database]
path = "auzolan.db"
pool_size = 16

[auth]
secret = ""
access_ttl_minutes = 60
refresh_ttl_hours = 24
password_iterations = 260000

[pagination]
default_page_size = 10
max_page_size = 100
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Allow any origin; the browser frontend is served from another port
    pub cors_permissive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for signing tokens
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_hours: i64,
    pub password_iterations: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// Full application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        debug!("Loading configuration (file: {})", file.display());

        let settings = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .add_source(File::from(file).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;
        config.ensure_secret();
        Ok(config)
    }

    /// Built-in defaults only; used by tests and as a fallback
    pub fn defaults() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .build()?;

        let mut config: AppConfig = settings.try_deserialize()?;
        config.ensure_secret();
        Ok(config)
    }

    fn ensure_secret(&mut self) {
        if self.auth.secret.is_empty() {
            warn!(
                "No auth secret configured (set {}_AUTH__SECRET); generating an ephemeral one, \
                 issued tokens will not survive a restart",
                ENV_PREFIX
            );
            self.auth.secret = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(48)
                .map(char::from)
                .collect();
        }
    }
}
