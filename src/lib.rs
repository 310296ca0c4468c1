// src/lib.rs
// AniScout - Seasonal anime discovery engine with taste-profile ranking
//
// Architecture:
// - Domain-centric: catalog, ratings, and preference records live in domain/
// - Cache-first: every external fetch goes through the expiring store
// - Explicit: no ambient statics; services own their collaborators
// - Degrade softly: cache and scoring failures never take the app down

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cache;
pub mod domain;
pub mod error;
pub mod integrations;
pub mod services;

// ============================================================================
// PUBLIC API - Domain Records
// ============================================================================

pub use domain::{
    validate_catalog_page,
    validate_ratings_page,
    // Catalog
    CatalogPage,
    CombinedScore,
    ContributingItem,
    FuzzyDate,
    Media,
    MediaTag,
    MediaTitle,
    PageInfo,
    // Preferences
    PreferenceScore,
    // Ratings
    RatedEntry,
    RatingsPage,
    ScoreBreakdown,
    ScoredMedia,
    Season,
    StaffCredit,
    Studio,
    Trailer,
    UserMediaScore,
    UserPreferenceProfile,
};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Cache
// ============================================================================

pub use cache::{CacheConfig, CacheKey, CacheStats, CacheStore, CachedPayload};

// ============================================================================
// PUBLIC API - Integrations
// ============================================================================

pub use integrations::{AniListClient, CatalogProvider, RatingsProvider};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    score_to_points, AggregatorConfig, DiscoveryConfig, DiscoveryService, FranchiseRules,
    PreferenceAggregator, PreferenceScorer, RankedPage, ScorerConfig,
};
