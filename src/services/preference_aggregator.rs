// src/services/preference_aggregator.rs
//
// Preference Aggregator
//
// Turns a user's full rated history into a preference profile:
// 1. Drop unrated entries, collapse franchises to one representative
// 2. Convert star ratings to signed points (fixed non-linear mapping)
// 3. Accumulate points per genre/studio/director/tag with provenance
// 4. Average, popularity-boost, and normalize per category
//
// The resulting profile is cached keyed by username before returning.
// An empty history yields an empty profile, never an error.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use regex::Regex;

use crate::cache::{CacheKey, CacheStore, CachedPayload};
use crate::domain::{ContributingItem, PreferenceScore, RatedEntry, UserPreferenceProfile};
use crate::services::score_normalizer::{apply_popularity_boost, normalize_scores, round1};

// ============================================================================
// POINT CONVERSION
// ============================================================================

/// Convert a raw user score to signed preference points.
///
/// The star mapping is fixed and non-linear: 5★→+10, 4★→+3, 3★→+1, 2★→−1,
/// 1★→−5. Strong positive signal outweighs strong negative signal because
/// viewers rate generously on average. Unrated (0) entries are excluded
/// entirely: not scored, not counted.
///
/// Scores above 5 are read as the 0-10 scale and halved to stars first.
pub fn score_to_points(raw_score: f64) -> Option<i32> {
    let stars = if raw_score > 5.0 {
        raw_score / 2.0
    } else {
        raw_score
    };

    match (stars.round() as i32).min(5) {
        s if s <= 0 => None,
        1 => Some(-5),
        2 => Some(-1),
        3 => Some(1),
        4 => Some(3),
        _ => Some(10),
    }
}

// ============================================================================
// FRANCHISE DEDUPLICATION (DETERMINISTIC, LAYERED)
// ============================================================================

/// Ordered rules reducing a title to its franchise base form.
/// Without this step a franchise with five rated seasons would contribute
/// five times the preference weight of a one-off watched title.
pub struct FranchiseRules {
    /// Sequel/season markers stripped from lowercased titles, in order
    strip_patterns: Vec<Regex>,
}

impl Default for FranchiseRules {
    fn default() -> Self {
        Self {
            strip_patterns: vec![
                // Subtitle after a colon: "Fate/stay night: Unlimited Blade Works"
                Regex::new(r"[:：]\s.*$").unwrap(),
                // Season 2, Season02
                Regex::new(r"\bseason\s*\d+\b").unwrap(),
                // 2nd Season, 3rd season
                Regex::new(r"\b\d+(?:st|nd|rd|th)\s+season\b").unwrap(),
                // Part 2, Part II
                Regex::new(r"\bpart\s*(?:\d+|ii|iii|iv)\b").unwrap(),
                // Trailing ordinal: "Haikyuu!! 2nd"
                Regex::new(r"\s\d+(?:st|nd|rd|th)$").unwrap(),
                // Trailing roman numeral: "Overlord IV"
                Regex::new(r"\s(?:ii|iii|iv|v|vi|vii|viii|ix|x|xi|xii)$").unwrap(),
                // Trailing year: "Hunter x Hunter (2011)"
                Regex::new(r"\s\(?(?:19|20)\d{2}\)?$").unwrap(),
            ],
        }
    }
}

impl FranchiseRules {
    /// Normalize a title to its franchise base form
    pub fn base_title(&self, title: &str) -> String {
        let lowered = title.to_lowercase();
        let mut current = lowered.trim().to_string();

        // Strip to a fixpoint: removing one marker can expose another
        // ("Mushoku Tensei II Part 2" → "Mushoku Tensei II" → "Mushoku Tensei")
        loop {
            let mut next = current.clone();
            for pattern in &self.strip_patterns {
                next = pattern.replace_all(next.trim(), "").to_string();
            }
            let next = next.split_whitespace().collect::<Vec<_>>().join(" ");
            if next == current {
                break;
            }
            current = next;
        }

        if current.is_empty() {
            // The whole title was markers; fall back so distinct titles
            // don't all collapse into one empty franchise
            lowered.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            current
        }
    }
}

/// Preference order between two rated entries of the same franchise: the
/// entry sorting first is the representative. The tie-break order is
/// significant: highest user score, then earliest completion date, then
/// earliest creation timestamp, then lowest id.
pub fn preference_order(a: &RatedEntry, b: &RatedEntry) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| cmp_option_asc(&a.completed_at, &b.completed_at))
        .then_with(|| cmp_option_asc(&a.created_at, &b.created_at))
        .then_with(|| a.media.id.cmp(&b.media.id))
}

/// Ascending compare with `None` sorting last
fn cmp_option_asc<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Collapse entries sharing a franchise base title to one representative
/// each. Output preserves first-seen franchise order; applying this twice
/// yields the identical list.
pub fn dedup_franchises(entries: &[RatedEntry], rules: &FranchiseRules) -> Vec<RatedEntry> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut result: Vec<RatedEntry> = Vec::new();

    for entry in entries {
        let base = rules.base_title(entry.media.title.display());
        match index.get(&base) {
            Some(&slot) => {
                if preference_order(entry, &result[slot]) == Ordering::Less {
                    result[slot] = entry.clone();
                }
            }
            None => {
                index.insert(base, result.len());
                result.push(entry.clone());
            }
        }
    }

    result
}

// ============================================================================
// AGGREGATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Popularity-boost ceiling, percent
    pub max_boost_percent: f64,

    /// Normalization target ranges per category type
    pub genre_range: (f64, f64),
    pub studio_range: (f64, f64),
    pub director_range: (f64, f64),
    pub tag_range: (f64, f64),

    /// Provenance bound per category value
    pub max_contributing_items: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_boost_percent: 20.0,
            genre_range: (-10.0, 10.0),
            studio_range: (-20.0, 20.0),
            director_range: (-20.0, 20.0),
            tag_range: (-10.0, 10.0),
            max_contributing_items: 10,
        }
    }
}

#[derive(Default)]
struct CategoryTotal {
    total: f64,
    count: u32,
    items: Vec<ContributingItem>,
}

#[derive(Default)]
struct Accumulator {
    totals: HashMap<String, CategoryTotal>,
}

impl Accumulator {
    fn add(&mut self, name: &str, points: f64, item: ContributingItem) {
        let entry = self.totals.entry(name.to_string()).or_default();
        entry.total += points;
        entry.count += 1;
        entry.items.push(item);
    }
}

pub struct PreferenceAggregator {
    cache: Arc<CacheStore>,
    rules: FranchiseRules,
    config: AggregatorConfig,
}

impl PreferenceAggregator {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self::with_config(cache, AggregatorConfig::default())
    }

    pub fn with_config(cache: Arc<CacheStore>, config: AggregatorConfig) -> Self {
        Self {
            cache,
            rules: FranchiseRules::default(),
            config,
        }
    }

    /// Build a preference profile from a user's rated history and cache it
    /// keyed by username. A history that is empty after filtering produces
    /// an empty profile.
    pub fn build_profile(&self, username: &str, entries: &[RatedEntry]) -> UserPreferenceProfile {
        let rated: Vec<RatedEntry> = entries
            .iter()
            .filter(|e| score_to_points(e.score).is_some())
            .cloned()
            .collect();

        let deduped = dedup_franchises(&rated, &self.rules);
        debug!(
            "aggregating {} rated entries ({} franchises) for {}",
            rated.len(),
            deduped.len(),
            username
        );

        let profile = self.aggregate(&deduped);
        self.cache.save(
            &CacheKey::preference_profile(username),
            &CachedPayload::Profile(profile.clone()),
        );
        profile
    }

    fn aggregate(&self, deduped: &[RatedEntry]) -> UserPreferenceProfile {
        if deduped.is_empty() {
            return UserPreferenceProfile::default();
        }

        let mut genres = Accumulator::default();
        let mut studios = Accumulator::default();
        let mut directors = Accumulator::default();
        let mut tags = Accumulator::default();

        for entry in deduped {
            let Some(points) = score_to_points(entry.score) else {
                continue;
            };

            let base_item = ContributingItem {
                title: entry.media.title.display().to_string(),
                user_score: entry.score,
                point_value: points,
                modified_value: None,
                image_url: entry.media.cover_image.clone(),
                role: None,
            };

            for genre in &entry.media.genres {
                genres.add(genre, points as f64, base_item.clone());
            }

            for studio in &entry.media.studios {
                studios.add(&studio.name, points as f64, base_item.clone());
            }

            for credit in &entry.media.staff {
                if credit.role.to_lowercase().contains("director") {
                    directors.add(
                        &credit.name,
                        points as f64,
                        ContributingItem {
                            role: Some(credit.role.clone()),
                            ..base_item.clone()
                        },
                    );
                }
            }

            for tag in &entry.media.tags {
                // Relevance rank 0-100 maps the multiplier to [0.5, 1.0]:
                // a barely-relevant tag influences preference half as much
                let weight = 0.5 + tag.rank.unwrap_or(0) as f64 / 200.0;
                let weighted = points as f64 * weight;
                tags.add(
                    &tag.name,
                    weighted,
                    ContributingItem {
                        modified_value: Some(round1(weighted)),
                        ..base_item.clone()
                    },
                );
            }
        }

        let top_pick = deduped
            .iter()
            .min_by(|a, b| preference_order(a, b))
            .map(|entry| entry.media.id);

        UserPreferenceProfile {
            genres: self.finalize(genres, self.config.genre_range),
            studios: self.finalize(studios, self.config.studio_range),
            directors: self.finalize(directors, self.config.director_range),
            tags: self.finalize(tags, self.config.tag_range),
            top_pick,
        }
    }

    /// Average the accumulated totals, then run the normalization pipeline
    fn finalize(&self, accumulator: Accumulator, range: (f64, f64)) -> Vec<PreferenceScore> {
        let mut scores: Vec<PreferenceScore> = accumulator
            .totals
            .into_iter()
            .map(|(name, mut totals)| {
                totals.items.sort_by(|a, b| {
                    let weight = |item: &ContributingItem| {
                        item.modified_value.unwrap_or(item.point_value as f64).abs()
                    };
                    weight(b).partial_cmp(&weight(a)).unwrap_or(Ordering::Equal)
                });
                totals.items.truncate(self.config.max_contributing_items);

                PreferenceScore {
                    raw_score: round1(totals.total / totals.count as f64),
                    count: totals.count,
                    popularity_adjusted_score: None,
                    normalized_score: None,
                    contributing_items: totals.items,
                    name,
                }
            })
            .collect();

        // Deterministic input order for the normalization pass
        scores.sort_by(|a, b| a.name.cmp(&b.name));

        let boosted = apply_popularity_boost(&scores, self.config.max_boost_percent);
        let mut normalized = normalize_scores(&boosted, range.0, range.1);

        normalized.sort_by(|a, b| {
            b.normalized_score
                .partial_cmp(&a.normalized_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        normalized
    }
}
