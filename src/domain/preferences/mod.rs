pub mod entity;

pub use entity::{
    CombinedScore, ContributingItem, PreferenceScore, ScoreBreakdown, ScoredMedia,
    UserMediaScore, UserPreferenceProfile,
};
