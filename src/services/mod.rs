//! Domain operations behind the HTTP API
//!
//! Each operation takes the storage, the acting user and a deserialized
//! input, runs its permission checks and queries inside one pooled
//! `interact` call, and returns a typed result or an [`AuzolanError`] that
//! already carries the right HTTP status.
//!
//! [`AuzolanError`]: crate::error::AuzolanError

pub mod accounts;
pub mod chat;
pub mod communities;
pub mod loans;
pub mod permissions;
pub mod reports;
pub mod requests;
pub mod validate;
