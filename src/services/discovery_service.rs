// src/services/discovery_service.rs
//
// Ranking Orchestrator
//
// Ties the engine together: fetches and caches catalog pages, fetches and
// caches user ratings, builds preference profiles, and produces the sorted
// list handed to the presentation layer.
//
// RULES:
// - Every fetch goes cache-first; every fresh fetch is validated before it
//   is cached or used
// - Catalog fetches retry with exponential backoff up to a fixed cap;
//   beyond the cap the page degrades to empty with the error surfaced
// - Rating histories are fetched page by page, sequentially, with a hard
//   page cap bounding latency and request volume
// - Profiles are read-through (memory → durable cache → recompute) and
//   write-through on recompute

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore, CachedPayload};
use crate::domain::{
    validate_catalog_page, validate_ratings_page, CatalogPage, CombinedScore, Media, PageInfo,
    RatedEntry, RatingsPage, ScoreBreakdown, ScoredMedia, Season, UserMediaScore,
    UserPreferenceProfile,
};
use crate::error::{AppError, AppResult};
use crate::integrations::{CatalogProvider, RatingsProvider};
use crate::services::preference_aggregator::PreferenceAggregator;
use crate::services::preference_scorer::{top_pick_for_user, PreferenceScorer};

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Hard cap on sequential rating-history page fetches
    pub max_rating_pages: u32,

    pub ratings_per_page: u32,

    /// Catalog fetch attempts before degrading to an empty page
    pub fetch_attempts: u32,

    /// First retry delay; doubles per attempt
    pub backoff_base_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_rating_pages: 10,
            ratings_per_page: 50,
            fetch_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

/// One ranked page of results. When the upstream fetch failed past the
/// retry cap, `items` is empty, pagination is zeroed, and `error` carries
/// the message for the retry-capable error panel.
#[derive(Debug, Clone)]
pub struct RankedPage {
    pub page_info: PageInfo,
    pub items: Vec<ScoredMedia>,
    pub error: Option<String>,
}

pub struct DiscoveryService {
    catalog: Arc<dyn CatalogProvider>,
    ratings: Arc<dyn RatingsProvider>,
    cache: Arc<CacheStore>,
    aggregator: PreferenceAggregator,
    scorer: PreferenceScorer,
    /// Session-lifetime profile cache, read-through over the durable store
    profiles: RwLock<HashMap<String, UserPreferenceProfile>>,
    config: DiscoveryConfig,
}

impl DiscoveryService {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        ratings: Arc<dyn RatingsProvider>,
        cache: Arc<CacheStore>,
    ) -> Self {
        Self::with_config(catalog, ratings, cache, DiscoveryConfig::default())
    }

    pub fn with_config(
        catalog: Arc<dyn CatalogProvider>,
        ratings: Arc<dyn RatingsProvider>,
        cache: Arc<CacheStore>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            catalog,
            ratings,
            aggregator: PreferenceAggregator::new(Arc::clone(&cache)),
            scorer: PreferenceScorer::new(),
            cache,
            profiles: RwLock::new(HashMap::new()),
            config,
        }
    }

    // ========================================================================
    // CATALOG
    // ========================================================================

    /// Fetch one seasonal catalog page, cache-first
    pub async fn seasonal_page(
        &self,
        season: Season,
        year: i32,
        page: u32,
        per_page: u32,
    ) -> AppResult<CatalogPage> {
        let key = CacheKey::CatalogPage {
            season,
            year,
            page,
            per_page,
        };

        if let Some(CachedPayload::Catalog(cached)) = self.cache.load(&key) {
            debug!("catalog cache hit for {}", key.storage_key());
            return Ok(cached);
        }

        let fetched = self
            .fetch_catalog_with_backoff(season, year, page, per_page)
            .await?;
        validate_catalog_page(&fetched)
            .map_err(|e| AppError::MalformedResponse(e.to_string()))?;

        self.cache.save(&key, &CachedPayload::Catalog(fetched.clone()));
        Ok(fetched)
    }

    /// Search the catalog by title. Searches are not cached: the query
    /// space is unbounded and would crowd out the seasonal namespace.
    pub async fn search_page(
        &self,
        search: &str,
        page: u32,
        per_page: u32,
    ) -> AppResult<CatalogPage> {
        let fetched = self.catalog.search_page(search, page, per_page).await?;
        validate_catalog_page(&fetched)
            .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
        Ok(fetched)
    }

    async fn fetch_catalog_with_backoff(
        &self,
        season: Season,
        year: i32,
        page: u32,
        per_page: u32,
    ) -> AppResult<CatalogPage> {
        let mut delay = self.config.backoff_base_ms;
        let mut last_error = AppError::Api("catalog fetch failed".to_string());

        for attempt in 1..=self.config.fetch_attempts {
            match self
                .catalog
                .seasonal_page(season, year, page, per_page)
                .await
            {
                Ok(fetched) => return Ok(fetched),
                // A broken contract will not heal on retry
                Err(e) if e.is_contract_violation() => return Err(e),
                Err(e) => {
                    warn!(
                        "catalog fetch attempt {}/{} failed: {}",
                        attempt, self.config.fetch_attempts, e
                    );
                    last_error = e;
                    if attempt < self.config.fetch_attempts {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }

        Err(last_error)
    }

    // ========================================================================
    // RATINGS & PROFILES
    // ========================================================================

    /// Fetch a user's complete rated history: sequential page fetches under
    /// a hard cap, each page cached, plus a merged snapshot cached per user.
    /// A nonexistent or private user resolves to an empty history.
    pub async fn user_ratings(&self, username: &str) -> AppResult<Vec<RatedEntry>> {
        let Some(user_id) = self.ratings.resolve_user(username).await? else {
            info!("user {} not found or private, using empty ratings", username);
            return Ok(Vec::new());
        };

        let full_key = CacheKey::CompleteRatings { user_id };
        if let Some(CachedPayload::Ratings(snapshot)) = self.cache.load(&full_key) {
            debug!("complete-ratings cache hit for user {}", user_id);
            return Ok(snapshot.media_list);
        }

        let per_page = self.config.ratings_per_page;
        let mut merged: Vec<RatedEntry> = Vec::new();
        let mut last_info = PageInfo::default();

        for page in 1..=self.config.max_rating_pages {
            let page_key = CacheKey::RatingsPage {
                user_id,
                page,
                per_page,
            };

            let fetched = match self.cache.load(&page_key) {
                Some(CachedPayload::Ratings(cached)) => cached,
                _ => {
                    let fetched = self.ratings.ratings_page(user_id, page, per_page).await?;
                    validate_ratings_page(&fetched)
                        .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
                    self.cache
                        .save(&page_key, &CachedPayload::Ratings(fetched.clone()));
                    fetched
                }
            };

            last_info = fetched.page_info;
            merged.extend(fetched.media_list);

            if !last_info.has_next_page {
                break;
            }
        }

        // has_next_page survives in the snapshot: a history truncated by
        // the page cap is recognizable as partial
        let snapshot = RatingsPage {
            page_info: last_info,
            media_list: merged.clone(),
        };
        self.cache.save(&full_key, &CachedPayload::Ratings(snapshot));

        Ok(merged)
    }

    /// Get a user's preference profile: memory first, then the durable
    /// cache, then a full recompute from the rated history. Recomputation
    /// writes through to both layers.
    pub async fn preference_profile(&self, username: &str) -> AppResult<UserPreferenceProfile> {
        let memory_key = username.to_lowercase();

        if let Ok(map) = self.profiles.read() {
            if let Some(profile) = map.get(&memory_key) {
                return Ok(profile.clone());
            }
        }

        if let Some(CachedPayload::Profile(profile)) =
            self.cache.load(&CacheKey::preference_profile(username))
        {
            debug!("profile cache hit for {}", username);
            self.remember_profile(&memory_key, &profile);
            return Ok(profile);
        }

        let history = self.user_ratings(username).await?;
        // The aggregator writes the durable cache entry itself
        let profile = self.aggregator.build_profile(username, &history);
        self.remember_profile(&memory_key, &profile);
        Ok(profile)
    }

    fn remember_profile(&self, memory_key: &str, profile: &UserPreferenceProfile) {
        if let Ok(mut map) = self.profiles.write() {
            map.insert(memory_key.to_string(), profile.clone());
        }
    }

    // ========================================================================
    // RANKING
    // ========================================================================

    /// The main entry point: one seasonal page, scored against the given
    /// users and ordered for display. Upstream failure past the retry cap
    /// degrades to an empty page with the error attached.
    pub async fn discover_season(
        &self,
        season: Season,
        year: i32,
        page: u32,
        per_page: u32,
        usernames: &[String],
    ) -> RankedPage {
        let catalog_page = match self.seasonal_page(season, year, page, per_page).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!("seasonal discovery degraded to empty: {}", e);
                return RankedPage {
                    page_info: PageInfo::default(),
                    items: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        self.rank_page(catalog_page, usernames).await
    }

    /// Score and order an already-fetched catalog page
    pub async fn rank_page(&self, page: CatalogPage, usernames: &[String]) -> RankedPage {
        let mut profiles: Vec<(String, UserPreferenceProfile)> = Vec::new();
        for username in usernames {
            match self.preference_profile(username).await {
                Ok(profile) => profiles.push((username.clone(), profile)),
                Err(e) => warn!("skipping user {} in ranking: {}", username, e),
            }
        }

        let mut items: Vec<ScoredMedia> = page
            .media
            .into_iter()
            .map(|media| self.score_media(media, &profiles))
            .collect();

        self.order_for_display(&mut items, &profiles);

        RankedPage {
            page_info: page.page_info,
            items,
            error: None,
        }
    }

    fn score_media(
        &self,
        media: Media,
        profiles: &[(String, UserPreferenceProfile)],
    ) -> ScoredMedia {
        let users: Vec<UserMediaScore> = profiles
            .iter()
            .map(|(username, profile)| self.scorer.score_for_user(username, profile, &media))
            .collect();

        let combined = if users.is_empty() {
            let base = self.scorer.base_score(&media);
            CombinedScore {
                media_id: media.id,
                score: base,
                breakdown: ScoreBreakdown {
                    base_score: base,
                    ..Default::default()
                },
            }
        } else {
            let usernames: Vec<String> = profiles.iter().map(|(name, _)| name.clone()).collect();
            let key = CacheKey::combined_score(media.id, &usernames);
            match self.cache.load(&key) {
                Some(CachedPayload::Combined(cached)) => cached,
                _ => {
                    let combined = self.scorer.combine(media.id, &users);
                    self.cache.save(&key, &CachedPayload::Combined(combined.clone()));
                    combined
                }
            }
        };

        ScoredMedia {
            media,
            users,
            combined,
        }
    }

    /// Display order: every user's top pick first (in a shuffled-looking
    /// but deterministic order), the rest by combined score descending.
    fn order_for_display(
        &self,
        items: &mut [ScoredMedia],
        profiles: &[(String, UserPreferenceProfile)],
    ) {
        let top_picks: HashSet<i64> = profiles
            .iter()
            .filter_map(|(username, profile)| top_pick_for_user(profile, username, items))
            .collect();

        items.sort_by(|a, b| {
            let a_top = top_picks.contains(&a.media.id);
            let b_top = top_picks.contains(&b.media.id);
            match (a_top, b_top) {
                (true, true) => shuffle_key(a.media.id).cmp(&shuffle_key(b.media.id)),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => b
                    .combined
                    .score
                    .partial_cmp(&a.combined.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.media.id.cmp(&b.media.id)),
            }
        });
    }
}

/// Deterministic bit-mix of a media id, used to interleave top picks
/// without favoring either user's pick by insertion order
fn shuffle_key(id: i64) -> u64 {
    let mut z = (id as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
