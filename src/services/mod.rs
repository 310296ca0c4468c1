// src/services/mod.rs
//
// Services Module - Scoring & Orchestration Layer

pub mod discovery_service;
pub mod preference_aggregator;
pub mod preference_scorer;
pub mod score_normalizer;

#[cfg(test)]
mod discovery_service_tests;

// Re-export all services and their types
pub use discovery_service::{DiscoveryConfig, DiscoveryService, RankedPage};

pub use preference_aggregator::{
    dedup_franchises, score_to_points, AggregatorConfig, FranchiseRules, PreferenceAggregator,
};

pub use preference_scorer::{top_pick_for_user, PreferenceScorer, ScorerConfig};

pub use score_normalizer::{apply_popularity_boost, normalize_scores, round1};
