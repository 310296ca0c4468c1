use serde::{Deserialize, Serialize};

use crate::domain::media::Media;

/// Provenance record: how one rated title contributed to a category score.
/// Kept for UI drill-down; bounded to a top-N before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingItem {
    pub title: String,

    /// The raw user score the points were derived from
    pub user_score: f64,

    /// Signed points from the fixed star mapping
    pub point_value: i32,

    /// Points after relevance weighting (tags only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_value: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Staff role that earned the credit (directors only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Aggregated preference for one category value (one genre, one studio, ...).
/// Immutable once computed for a given input set; superseded entirely on
/// recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceScore {
    pub name: String,

    /// Average points across contributing titles
    pub raw_score: f64,

    /// Number of contributing titles; never zero for a materialized entry
    pub count: u32,

    pub popularity_adjusted_score: Option<f64>,
    pub normalized_score: Option<f64>,

    pub contributing_items: Vec<ContributingItem>,
}

impl PreferenceScore {
    pub fn new(name: String, raw_score: f64, count: u32) -> Self {
        Self {
            name,
            raw_score,
            count,
            popularity_adjusted_score: None,
            normalized_score: None,
            contributing_items: Vec::new(),
        }
    }

    /// Popularity-adjusted score when present, raw score otherwise
    pub fn score_to_use(&self) -> f64 {
        self.popularity_adjusted_score.unwrap_or(self.raw_score)
    }
}

/// Per-user aggregated preferences across all four category types.
/// Owned by a single username; cached keyed by username.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferenceProfile {
    pub genres: Vec<PreferenceScore>,
    pub studios: Vec<PreferenceScore>,
    pub directors: Vec<PreferenceScore>,
    pub tags: Vec<PreferenceScore>,

    /// Designated favorite: the highest-points representative title
    pub top_pick: Option<i64>,
}

impl UserPreferenceProfile {
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.studios.is_empty()
            && self.directors.is_empty()
            && self.tags.is_empty()
    }
}

/// Itemized components of a composite score. Every modifier is clamped to
/// its percentage-of-base cap before it lands here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub studio_score: f64,
    pub director_score: f64,
    pub genre_score: f64,
    pub tag_score: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.base_score + self.studio_score + self.director_score + self.genre_score + self.tag_score
    }
}

/// One user's composite score for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMediaScore {
    pub username: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Group composite: arithmetic mean across users of the total and of every
/// breakdown field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedScore {
    pub media_id: i64,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// A candidate catalog item augmented with preference scores.
/// Additive wrapper; the source record is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMedia {
    pub media: Media,
    pub users: Vec<UserMediaScore>,
    pub combined: CombinedScore,
}
