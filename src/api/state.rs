//! Shared state handed to every handler

use crate::auth::{PasswordHasher, TokenSigner};
use crate::config::{AppConfig, PaginationConfig};
use crate::error::Result;
use crate::pagination::{PageQuery, PageRequest};
use crate::storage::Storage;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub tokens: Arc<TokenSigner>,
    pub passwords: PasswordHasher,
    pub pagination: PaginationConfig,
}

impl AppState {
    pub fn new(storage: Arc<Storage>, config: &AppConfig) -> Self {
        Self {
            storage,
            tokens: Arc::new(TokenSigner::from_config(&config.auth)),
            passwords: PasswordHasher::new(config.auth.password_iterations),
            pagination: config.pagination,
        }
    }

    /// Validate the `page`/`page_size` query against the configured limits
    pub fn page(&self, query: &PageQuery) -> Result<PageRequest> {
        PageRequest::from_query(query, &self.pagination)
    }
}
