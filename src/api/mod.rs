//! HTTP API for the Auzolan backend
//!
//! Provides:
//! - Account, profile and community endpoints
//! - Help requests, volunteer offers and request chat
//! - Reports and moderation actions
//! - Item loans between neighbours

mod accounts;
mod chat;
mod communities;
pub mod extract;
mod loans;
mod reports;
mod requests;
pub mod server;
pub mod state;

pub use server::{build_router, ApiServer};
pub use state::AppState;
