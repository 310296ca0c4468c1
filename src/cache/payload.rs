// src/cache/payload.rs
//
// Cached payload envelope and reduced-fidelity variants
//
// Payloads are tagged so a read can verify that what came back is the type
// the key promised. Reduction is a pure transformation: it returns a new,
// smaller record and never mutates its input.

use serde::{Deserialize, Serialize};

use crate::domain::{
    CatalogPage, CombinedScore, Media, RatedEntry, RatingsPage, UserPreferenceProfile,
};

/// What a cache entry may hold, discriminated by a persisted tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedPayload {
    Catalog(CatalogPage),
    Ratings(RatingsPage),
    Profile(UserPreferenceProfile),
    Combined(CombinedScore),
}

/// The persisted envelope: `{timestamp, data}`, JSON-serialized.
/// An entry is valid iff `now - timestamp` is under the configured TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub timestamp: i64,
    pub data: CachedPayload,
}

impl CachedPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            CachedPayload::Catalog(_) => "catalog",
            CachedPayload::Ratings(_) => "ratings",
            CachedPayload::Profile(_) => "profile",
            CachedPayload::Combined(_) => "combined",
        }
    }

    /// Build a reduced-fidelity variant for storage when the full payload
    /// exceeds the per-entry ceiling: non-essential imagery and trailers are
    /// dropped, nested lists capped, provenance trimmed to the top entries.
    pub fn reduced(&self, max_list_items: usize, max_contributing_items: usize) -> CachedPayload {
        match self {
            CachedPayload::Catalog(page) => CachedPayload::Catalog(CatalogPage {
                page_info: page.page_info,
                media: page
                    .media
                    .iter()
                    .take(max_list_items)
                    .map(|m| reduce_media(m, max_list_items))
                    .collect(),
            }),
            CachedPayload::Ratings(page) => CachedPayload::Ratings(RatingsPage {
                page_info: page.page_info,
                media_list: page
                    .media_list
                    .iter()
                    .map(|e| reduce_rated_entry(e, max_list_items))
                    .collect(),
            }),
            CachedPayload::Profile(profile) => {
                CachedPayload::Profile(reduce_profile(profile, max_contributing_items))
            }
            // Already minimal
            CachedPayload::Combined(score) => CachedPayload::Combined(score.clone()),
        }
    }
}

fn reduce_media(media: &Media, max_list_items: usize) -> Media {
    Media {
        banner_image: None,
        trailer: None,
        description: None,
        tags: media.tags.iter().take(max_list_items).cloned().collect(),
        staff: media.staff.iter().take(max_list_items).cloned().collect(),
        ..media.clone()
    }
}

fn reduce_rated_entry(entry: &RatedEntry, max_list_items: usize) -> RatedEntry {
    RatedEntry {
        media: reduce_media(&entry.media, max_list_items),
        score: entry.score,
        completed_at: entry.completed_at,
        created_at: entry.created_at,
    }
}

fn reduce_profile(
    profile: &UserPreferenceProfile,
    max_contributing_items: usize,
) -> UserPreferenceProfile {
    let trim = |scores: &[crate::domain::PreferenceScore]| {
        scores
            .iter()
            .map(|score| {
                let mut reduced = score.clone();
                reduced.contributing_items = score
                    .contributing_items
                    .iter()
                    .take(max_contributing_items)
                    .map(|item| {
                        let mut item = item.clone();
                        item.image_url = None;
                        item
                    })
                    .collect();
                reduced
            })
            .collect()
    };

    UserPreferenceProfile {
        genres: trim(&profile.genres),
        studios: trim(&profile.studios),
        directors: trim(&profile.directors),
        tags: trim(&profile.tags),
        top_pick: profile.top_pick,
    }
}
