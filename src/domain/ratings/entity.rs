use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::media::{Media, PageInfo};

/// A single rated title from a user's list history.
/// Produced by the ratings API; consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatedEntry {
    pub media: Media,

    /// Raw user score on the account's scale (0-5 or 0-10); 0 means unrated
    pub score: f64,

    /// Date the user finished the title, when recorded
    pub completed_at: Option<NaiveDate>,

    /// List-entry creation time (epoch seconds), when recorded
    pub created_at: Option<i64>,
}

/// One page of a user's rated list, or the merged all-pages snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingsPage {
    pub page_info: PageInfo,
    pub media_list: Vec<RatedEntry>,
}
