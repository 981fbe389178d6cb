//! Page-number pagination
//!
//! `page` starts at 1, `page_size` falls back to the configured default and
//! is capped at the configured maximum. Responses carry `next`/`previous`
//! links built from the request path with only the `page` parameter changed.

use crate::config::PaginationConfig;
use crate::error::{AuzolanError, Result};
use serde::{Deserialize, Serialize};

const PAGE_PARAM: &str = "page";

/// Raw `page`/`page_size` query values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// A validated page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Parse query values; a non-numeric or non-positive page is a 404
    ///
    /// An unusable `page_size` silently falls back to the default.
    pub fn parse(page: Option<&str>, page_size: Option<&str>, config: &PaginationConfig) -> Result<Self> {
        let page = match page.map(str::trim).filter(|p| !p.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(invalid_page()),
            },
        };

        let max = i64::from(config.max_page_size.max(1));
        let page_size = page_size
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(max))
            .unwrap_or_else(|| i64::from(config.default_page_size).clamp(1, max));

        Ok(Self { page, page_size })
    }

    pub fn from_query(query: &PageQuery, config: &PaginationConfig) -> Result<Self> {
        Self::parse(query.page.as_deref(), query.page_size.as_deref(), config)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn num_pages(&self, count: i64) -> i64 {
        if count <= 0 {
            1
        } else {
            (count + self.page_size - 1) / self.page_size
        }
    }

    /// The first page always exists, even when empty
    pub fn ensure_in_range(&self, count: i64) -> Result<()> {
        if self.page > self.num_pages(count) {
            return Err(invalid_page());
        }
        Ok(())
    }
}

fn invalid_page() -> AuzolanError {
    AuzolanError::NotFound("Invalid page.".to_string())
}

/// One page of results before links are attached
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub request: PageRequest,
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn has_next(&self) -> bool {
        self.request.page < self.request.num_pages(self.count)
    }

    pub fn has_previous(&self) -> bool {
        self.request.page > 1
    }

    /// Attach `next`/`previous` links relative to `path_and_query`
    pub fn into_page(self, path_and_query: &str) -> Page<T> {
        let next = self
            .has_next()
            .then(|| with_page(path_and_query, Some(self.request.page + 1)));
        let previous = self.has_previous().then(|| {
            let target = self.request.page - 1;
            // Page 1 is linked without an explicit page parameter
            with_page(path_and_query, (target > 1).then_some(target))
        });

        Page {
            count: self.count,
            next,
            previous,
            results: self.results,
        }
    }
}

/// Paginated response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Replace (or drop, with `None`) the `page` query parameter
fn with_page(path_and_query: &str, page: Option<i64>) -> String {
    let (path, query) = path_and_query
        .split_once('?')
        .unwrap_or((path_and_query, ""));

    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some(PAGE_PARAM))
        .map(str::to_string)
        .collect();
    if let Some(page) = page {
        pairs.push(format!("{}={}", PAGE_PARAM, page));
    }

    if pairs.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, pairs.join("&"))
    }
}
