// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// This file MUST declare all domain modules and re-export their public API.
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod media;
pub mod preferences;
pub mod ratings;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Media Domain (catalog records)
pub use media::{
    validate_catalog_page, CatalogPage, FuzzyDate, Media, MediaTag, MediaTitle, PageInfo, Season,
    StaffCredit, Studio, Trailer,
};

// Ratings Domain (rated-item history)
pub use ratings::{validate_ratings_page, RatedEntry, RatingsPage};

// Preferences Domain (derived profiles and scores)
pub use preferences::{
    CombinedScore, ContributingItem, PreferenceScore, ScoreBreakdown, ScoredMedia,
    UserMediaScore, UserPreferenceProfile,
};

// ============================================================================
// DOMAIN ERRORS
// ============================================================================

use thiserror::Error;

/// Errors representing domain rule violations
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;
