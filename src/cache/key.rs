// src/cache/key.rs
//
// Discriminated cache keys
//
// Each query shape gets its own variant and its own key namespace. The
// variant tag, not field presence, decides how keys are generated and
// which payload type a read is allowed to return.

use crate::cache::payload::CachedPayload;
use crate::domain::Season;

/// Key namespaces. Eviction and statistics are scoped to a single prefix
/// and never cross into another.
pub const CATALOG_PREFIX: &str = "catalog";
pub const RATINGS_PREFIX: &str = "ratings";
pub const COMPLETE_RATINGS_PREFIX: &str = "ratings_full";
pub const PREFERENCES_PREFIX: &str = "prefs";
pub const COMBINED_PREFIX: &str = "combined";

/// A cache lookup key. Deterministic: the same logical query always builds
/// the same storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One page of seasonal catalog results
    CatalogPage {
        season: Season,
        year: i32,
        page: u32,
        per_page: u32,
    },

    /// One page of a user's rated list
    RatingsPage {
        user_id: i64,
        page: u32,
        per_page: u32,
    },

    /// A user's all-pages-merged ratings snapshot
    CompleteRatings { user_id: i64 },

    /// A user's aggregated preference profile
    PreferenceProfile { username: String },

    /// A group's combined score for one catalog item
    CombinedScore {
        media_id: i64,
        usernames: Vec<String>,
    },
}

impl CacheKey {
    /// Build a combined-score key. Usernames are lowercased and sorted so
    /// the same group always maps to the same key regardless of order.
    pub fn combined_score(media_id: i64, usernames: &[String]) -> Self {
        let mut normalized: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        normalized.sort();
        normalized.dedup();
        CacheKey::CombinedScore {
            media_id,
            usernames: normalized,
        }
    }

    /// Build a profile key with a normalized username
    pub fn preference_profile(username: &str) -> Self {
        CacheKey::PreferenceProfile {
            username: username.to_lowercase(),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            CacheKey::CatalogPage { .. } => CATALOG_PREFIX,
            CacheKey::RatingsPage { .. } => RATINGS_PREFIX,
            CacheKey::CompleteRatings { .. } => COMPLETE_RATINGS_PREFIX,
            CacheKey::PreferenceProfile { .. } => PREFERENCES_PREFIX,
            CacheKey::CombinedScore { .. } => COMBINED_PREFIX,
        }
    }

    /// Deterministic storage key string
    pub fn storage_key(&self) -> String {
        match self {
            CacheKey::CatalogPage {
                season,
                year,
                page,
                per_page,
            } => format!(
                "{}_{}_{}_{}_{}",
                CATALOG_PREFIX,
                season.as_str(),
                year,
                page,
                per_page
            ),
            CacheKey::RatingsPage {
                user_id,
                page,
                per_page,
            } => format!(
                "{}_user_{}_{}_{}",
                RATINGS_PREFIX, user_id, page, per_page
            ),
            CacheKey::CompleteRatings { user_id } => {
                format!("{}_user_{}", COMPLETE_RATINGS_PREFIX, user_id)
            }
            CacheKey::PreferenceProfile { username } => {
                format!("{}_{}", PREFERENCES_PREFIX, username.to_lowercase())
            }
            CacheKey::CombinedScore {
                media_id,
                usernames,
            } => format!(
                "{}_{}_{}",
                COMBINED_PREFIX,
                media_id,
                usernames.join("+")
            ),
        }
    }

    /// Whether a decoded payload is the type this key is allowed to return.
    /// A mismatch on read is treated as corruption, never handed back.
    pub fn matches_payload(&self, payload: &CachedPayload) -> bool {
        matches!(
            (self, payload),
            (CacheKey::CatalogPage { .. }, CachedPayload::Catalog(_))
                | (CacheKey::RatingsPage { .. }, CachedPayload::Ratings(_))
                | (CacheKey::CompleteRatings { .. }, CachedPayload::Ratings(_))
                | (CacheKey::PreferenceProfile { .. }, CachedPayload::Profile(_))
                | (CacheKey::CombinedScore { .. }, CachedPayload::Combined(_))
        )
    }
}
