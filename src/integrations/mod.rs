// src/integrations/mod.rs
//
// External integrations
//
// Providers are trait objects so the orchestration layer can be exercised
// against mocks; AniList is the production implementation of both.

pub mod anilist;

pub use anilist::AniListClient;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::{CatalogPage, RatingsPage, Season};
use crate::error::AppResult;

/// Read-only source of paginated catalog records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn seasonal_page(
        &self,
        season: Season,
        year: i32,
        page: u32,
        per_page: u32,
    ) -> AppResult<CatalogPage>;

    async fn search_page(&self, search: &str, page: u32, per_page: u32)
        -> AppResult<CatalogPage>;
}

/// Read-only source of user rating histories
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RatingsProvider: Send + Sync {
    /// Resolve a username to its numeric id. A nonexistent or private user
    /// resolves to `None`; it is an expected, common case, not an error.
    async fn resolve_user(&self, username: &str) -> AppResult<Option<i64>>;

    async fn ratings_page(&self, user_id: i64, page: u32, per_page: u32)
        -> AppResult<RatingsPage>;
}
