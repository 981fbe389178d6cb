//! Auzolan - Community Mutual-Aid Backend
//!
//! A JSON HTTP backend where neighbours organised in communities:
//! - Publish help requests and volunteer for them
//! - Chat once a volunteer has been accepted
//! - Lend items to each other
//! - Report abusive requests to community moderators
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Entities and status enums (HelpRequest, LoanItem, etc.)
//! - **Storage**: SQLite queries behind a deadpool connection pool
//! - **Services**: Permission checks, validation and state transitions
//! - **API**: axum router, extractors and handlers
//!
//! # Example
//!
//! ```ignore
//! use auzolan_core::{api::{ApiServer, AppState}, AppConfig, Storage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let storage = Arc::new(Storage::open(&config.database.path, config.database.pool_size)?);
//!     storage.run_migrations().await?;
//!
//!     let state = AppState::new(storage, &config);
//!     ApiServer::new(&config.server, state).serve().await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod pagination;
pub mod seed;
pub mod services;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AuzolanError, Result};
pub use storage::Storage;
pub use types::{
    Actor, CommunityRole, HelpRequest, LoanItem, LoanStatus, MembershipStatus, RequestStatus,
};
