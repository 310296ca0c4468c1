// src/services/preference_scorer.rs
//
// Preference Scorer
//
// Scores one candidate catalog item against one or more user profiles.
// The composite is a popularity-derived base score plus four per-category
// modifiers, each clamped to a percentage of the base so no single
// category can swamp the ranking:
//   studio ±20%, director ±20%, genre ±10%, tag ±15%
//
// Genre and tag modifiers use diminishing returns (avg * sqrt(matches)):
// matching many broad categories adds confidence, but sub-linearly.

use std::cmp::Ordering;

use crate::domain::{
    CombinedScore, Media, PreferenceScore, ScoreBreakdown, UserMediaScore, UserPreferenceProfile,
};

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Added to popularity before the log so zero popularity stays finite
    pub popularity_epsilon: f64,

    /// Per-category caps as a fraction of the base score
    pub studio_cap: f64,
    pub director_cap: f64,
    pub genre_cap: f64,
    pub tag_cap: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            popularity_epsilon: 1.0,
            studio_cap: 0.20,
            director_cap: 0.20,
            genre_cap: 0.10,
            tag_cap: 0.15,
        }
    }
}

pub struct PreferenceScorer {
    config: ScorerConfig,
}

impl Default for PreferenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceScorer {
    pub fn new() -> Self {
        Self::with_config(ScorerConfig::default())
    }

    pub fn with_config(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Popularity-derived base score: `log10(popularity + eps) * 2`.
    /// Roughly 6.0 at 1K popularity, 8.0 at 10K, 10.0 at 100K; an item
    /// with no popularity figure scores 0.
    pub fn base_score(&self, media: &Media) -> f64 {
        match media.popularity {
            Some(popularity) => (popularity as f64 + self.config.popularity_epsilon).log10() * 2.0,
            None => 0.0,
        }
    }

    /// Score a candidate against one user's profile
    pub fn score_for_user(
        &self,
        username: &str,
        profile: &UserPreferenceProfile,
        media: &Media,
    ) -> UserMediaScore {
        let base = self.base_score(media);

        let studio_names: Vec<&str> = media.studios.iter().map(|s| s.name.as_str()).collect();
        let genre_names: Vec<&str> = media.genres.iter().map(|g| g.as_str()).collect();
        let tag_names: Vec<&str> = media.tags.iter().map(|t| t.name.as_str()).collect();

        let studio_score = self.averaged_impact(
            &matched_values(&profile.studios, &studio_names),
            base,
            self.config.studio_cap,
        );
        let director_score = self.averaged_impact(
            &matched_values(&profile.directors, &media.director_names()),
            base,
            self.config.director_cap,
        );
        let genre_score = self.diminishing_impact(
            &matched_values(&profile.genres, &genre_names),
            base,
            self.config.genre_cap,
        );
        let tag_score = self.diminishing_impact(
            &matched_values(&profile.tags, &tag_names),
            base,
            self.config.tag_cap,
        );

        let breakdown = ScoreBreakdown {
            base_score: base,
            studio_score,
            director_score,
            genre_score,
            tag_score,
        };

        UserMediaScore {
            username: username.to_string(),
            score: breakdown.total(),
            breakdown,
        }
    }

    /// Combine per-user composites into a group score: the arithmetic mean
    /// of the total and of every breakdown field. The base score is shared
    /// by all users, so averaging leaves it unchanged; only the preference
    /// deltas are diluted by group size.
    pub fn combine(&self, media_id: i64, user_scores: &[UserMediaScore]) -> CombinedScore {
        if user_scores.is_empty() {
            return CombinedScore {
                media_id,
                score: 0.0,
                breakdown: ScoreBreakdown::default(),
            };
        }

        let n = user_scores.len() as f64;
        let breakdown = ScoreBreakdown {
            base_score: user_scores.iter().map(|u| u.breakdown.base_score).sum::<f64>() / n,
            studio_score: user_scores.iter().map(|u| u.breakdown.studio_score).sum::<f64>() / n,
            director_score: user_scores
                .iter()
                .map(|u| u.breakdown.director_score)
                .sum::<f64>()
                / n,
            genre_score: user_scores.iter().map(|u| u.breakdown.genre_score).sum::<f64>() / n,
            tag_score: user_scores.iter().map(|u| u.breakdown.tag_score).sum::<f64>() / n,
        };

        CombinedScore {
            media_id,
            score: user_scores.iter().map(|u| u.score).sum::<f64>() / n,
            breakdown,
        }
    }

    /// Straight-average modifier (studio, director)
    fn averaged_impact(&self, matched: &[f64], base: f64, cap_fraction: f64) -> f64 {
        if matched.is_empty() {
            return 0.0;
        }
        self.scaled_impact(average(matched), base, cap_fraction)
    }

    /// Diminishing-returns modifier (genre, tag): `avg * sqrt(matches)`
    fn diminishing_impact(&self, matched: &[f64], base: f64, cap_fraction: f64) -> f64 {
        if matched.is_empty() {
            return 0.0;
        }
        let raw = average(matched) * (matched.len() as f64).sqrt();
        self.scaled_impact(raw, base, cap_fraction)
    }

    /// Convert a normalized preference magnitude into a clamped share of
    /// the base score
    fn scaled_impact(&self, raw: f64, base: f64, cap_fraction: f64) -> f64 {
        if base <= 0.0 {
            return 0.0;
        }
        let impact = raw / 10.0 * 2.0 * base;
        let cap = cap_fraction * base;
        impact.clamp(-cap, cap)
    }
}

/// Match candidate category names against profile entries: exact name match
/// first, case-insensitive fallback second
fn matched_values(preferences: &[PreferenceScore], names: &[&str]) -> Vec<f64> {
    names
        .iter()
        .filter_map(|name| {
            preferences
                .iter()
                .find(|p| p.name == *name)
                .or_else(|| preferences.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
                .map(|p| p.normalized_score.unwrap_or(0.0))
        })
        .collect()
}

/// Pick a user's top candidate: the profile's designated top pick when it
/// is among the candidates, else that user's highest-scoring candidate.
pub fn top_pick_for_user(
    profile: &UserPreferenceProfile,
    username: &str,
    candidates: &[crate::domain::ScoredMedia],
) -> Option<i64> {
    if let Some(designated) = profile.top_pick {
        if candidates.iter().any(|c| c.media.id == designated) {
            return Some(designated);
        }
    }

    candidates
        .iter()
        .filter_map(|candidate| {
            candidate
                .users
                .iter()
                .find(|u| u.username == username)
                .map(|u| (candidate.media.id, u.score))
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(id, _)| id)
}

fn average(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MediaTag, MediaTitle, StaffCredit, Studio};

    fn media(popularity: Option<u64>) -> Media {
        Media {
            id: 1,
            title: MediaTitle::default(),
            description: None,
            cover_image: None,
            banner_image: None,
            trailer: None,
            season: None,
            season_year: None,
            format: None,
            status: None,
            episodes: None,
            genres: Vec::new(),
            tags: Vec::new(),
            average_score: None,
            popularity,
            start_date: None,
            end_date: None,
            studios: Vec::new(),
            staff: Vec::new(),
        }
    }

    fn pref(name: &str, normalized: f64) -> PreferenceScore {
        let mut score = PreferenceScore::new(name.to_string(), normalized, 1);
        score.normalized_score = Some(normalized);
        score
    }

    #[test]
    fn test_base_score_log_scale() {
        let scorer = PreferenceScorer::new();
        assert!((scorer.base_score(&media(Some(1_000))) - 6.0).abs() < 0.01);
        assert!((scorer.base_score(&media(Some(10_000))) - 8.0).abs() < 0.01);
        assert!((scorer.base_score(&media(Some(100_000))) - 10.0).abs() < 0.01);
        assert_eq!(scorer.base_score(&media(None)), 0.0);
    }

    #[test]
    fn test_studio_clamped_to_twenty_percent() {
        let scorer = PreferenceScorer::new();
        let mut item = media(Some(10_000));
        item.studios = vec![Studio {
            id: 1,
            name: "Bones".to_string(),
        }];

        // A synthetic magnitude far past any real normalized range still
        // lands exactly on the cap
        for magnitude in [20.0, 1_000.0] {
            let profile = UserPreferenceProfile {
                studios: vec![pref("Bones", magnitude)],
                ..Default::default()
            };
            let scored = scorer.score_for_user("a", &profile, &item);
            let base = scored.breakdown.base_score;
            assert!((scored.breakdown.studio_score - 0.20 * base).abs() < 1e-9);
        }

        // And the negative side mirrors it
        let profile = UserPreferenceProfile {
            studios: vec![pref("Bones", -1_000.0)],
            ..Default::default()
        };
        let scored = scorer.score_for_user("a", &profile, &item);
        let base = scored.breakdown.base_score;
        assert!((scored.breakdown.studio_score + 0.20 * base).abs() < 1e-9);
    }

    #[test]
    fn test_genre_and_tag_caps() {
        let scorer = PreferenceScorer::new();
        let mut item = media(Some(10_000));
        item.genres = vec!["Action".to_string(), "Drama".to_string()];
        item.tags = vec![
            MediaTag {
                name: "Space".to_string(),
                rank: Some(90),
                category: None,
            },
            MediaTag {
                name: "Mecha".to_string(),
                rank: Some(80),
                category: None,
            },
        ];

        let profile = UserPreferenceProfile {
            genres: vec![pref("Action", 500.0), pref("Drama", 500.0)],
            tags: vec![pref("Space", 500.0), pref("Mecha", 500.0)],
            ..Default::default()
        };
        let scored = scorer.score_for_user("a", &profile, &item);
        let base = scored.breakdown.base_score;

        assert!((scored.breakdown.genre_score - 0.10 * base).abs() < 1e-9);
        assert!((scored.breakdown.tag_score - 0.15 * base).abs() < 1e-9);
        assert!(
            (scored.score
                - (base + scored.breakdown.genre_score + scored.breakdown.tag_score))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_diminishing_returns_uses_sqrt() {
        let scorer = PreferenceScorer::new();
        let mut one_match = media(Some(10_000));
        one_match.genres = vec!["Action".to_string()];
        let mut four_matches = media(Some(10_000));
        four_matches.genres = vec![
            "Action".to_string(),
            "Drama".to_string(),
            "Comedy".to_string(),
            "Sports".to_string(),
        ];

        // Small magnitudes so nothing hits the cap
        let profile = UserPreferenceProfile {
            genres: vec![
                pref("Action", 0.5),
                pref("Drama", 0.5),
                pref("Comedy", 0.5),
                pref("Sports", 0.5),
            ],
            ..Default::default()
        };

        let single = scorer.score_for_user("a", &profile, &one_match);
        let quad = scorer.score_for_user("a", &profile, &four_matches);

        // Four equal matches double (sqrt(4)) the single-match impact
        assert!(
            (quad.breakdown.genre_score - 2.0 * single.breakdown.genre_score).abs() < 1e-9
        );
    }

    #[test]
    fn test_case_insensitive_fallback_match() {
        let scorer = PreferenceScorer::new();
        let mut item = media(Some(10_000));
        item.studios = vec![Studio {
            id: 1,
            name: "BONES".to_string(),
        }];

        let profile = UserPreferenceProfile {
            studios: vec![pref("Bones", 1.0)],
            ..Default::default()
        };
        let scored = scorer.score_for_user("a", &profile, &item);
        assert!(scored.breakdown.studio_score > 0.0);
    }

    #[test]
    fn test_director_matching() {
        let scorer = PreferenceScorer::new();
        let mut item = media(Some(10_000));
        item.staff = vec![
            StaffCredit {
                role: "Director".to_string(),
                name: "Masaaki Yuasa".to_string(),
            },
            StaffCredit {
                role: "Music".to_string(),
                name: "Kensuke Ushio".to_string(),
            },
        ];

        let profile = UserPreferenceProfile {
            directors: vec![pref("Masaaki Yuasa", 1.0), pref("Kensuke Ushio", 1.0)],
            ..Default::default()
        };
        let scored = scorer.score_for_user("a", &profile, &item);
        // Only the director credit matches; the music credit is not a
        // director and must not contribute
        let base = scored.breakdown.base_score;
        let expected = (1.0 / 10.0 * 2.0 * base).min(0.20 * base);
        assert!((scored.breakdown.director_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_profile_scores_base_only() {
        let scorer = PreferenceScorer::new();
        let item = media(Some(10_000));
        let scored = scorer.score_for_user("a", &UserPreferenceProfile::default(), &item);
        assert_eq!(scored.score, scored.breakdown.base_score);
        assert_eq!(scored.breakdown.studio_score, 0.0);
        assert_eq!(scored.breakdown.genre_score, 0.0);
    }

    #[test]
    fn test_combine_averages_every_field() {
        let scorer = PreferenceScorer::new();
        let a = UserMediaScore {
            username: "a".to_string(),
            score: 12.0,
            breakdown: ScoreBreakdown {
                base_score: 8.0,
                studio_score: 1.5,
                director_score: 1.0,
                genre_score: 0.5,
                tag_score: 1.0,
            },
        };
        let b = UserMediaScore {
            username: "b".to_string(),
            score: 6.0,
            breakdown: ScoreBreakdown {
                base_score: 8.0,
                studio_score: -1.0,
                director_score: -0.5,
                genre_score: -0.2,
                tag_score: -0.3,
            },
        };

        let combined = scorer.combine(42, &[a, b]);
        assert_eq!(combined.media_id, 42);
        assert!((combined.score - 9.0).abs() < 1e-9);
        // The shared base is unchanged by averaging
        assert!((combined.breakdown.base_score - 8.0).abs() < 1e-9);
        assert!((combined.breakdown.studio_score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_no_popularity_means_no_modifiers() {
        let scorer = PreferenceScorer::new();
        let mut item = media(None);
        item.genres = vec!["Action".to_string()];
        let profile = UserPreferenceProfile {
            genres: vec![pref("Action", 10.0)],
            ..Default::default()
        };

        let scored = scorer.score_for_user("a", &profile, &item);
        // No base, nothing to take a percentage of
        assert_eq!(scored.score, 0.0);
    }
}
