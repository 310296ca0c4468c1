use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broadcast quarter used by the catalog API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "WINTER",
            Season::Spring => "SPRING",
            Season::Summer => "SUMMER",
            Season::Fall => "FALL",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WINTER" => Ok(Season::Winter),
            "SPRING" => Ok(Season::Spring),
            "SUMMER" => Ok(Season::Summer),
            "FALL" => Ok(Season::Fall),
            other => Err(format!("Unknown season: {}", other)),
        }
    }
}

/// Title variants as reported by the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl MediaTitle {
    /// Preferred display form: romaji, then english, then native
    pub fn display(&self) -> &str {
        self.romaji
            .as_deref()
            .or(self.english.as_deref())
            .or(self.native.as_deref())
            .unwrap_or("")
    }
}

/// A tag with its relevance rank (0-100)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTag {
    pub name: String,
    pub rank: Option<u32>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Studio {
    pub id: i64,
    pub name: String,
}

/// A staff credit (role string + person name)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCredit {
    pub role: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    pub id: Option<String>,
    pub site: Option<String>,
    pub thumbnail: Option<String>,
}

/// Partial calendar date as reported by the catalog API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl FuzzyDate {
    /// Concrete date when all three parts are present
    pub fn to_naive(&self) -> Option<NaiveDate> {
        match (self.year, self.month, self.day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        }
    }
}

/// A single media record returned by the catalog API.
/// Read-only source data; scoring wraps it and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub title: MediaTitle,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub trailer: Option<Trailer>,
    pub season: Option<Season>,
    pub season_year: Option<i32>,
    pub format: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<u32>,
    pub genres: Vec<String>,
    pub tags: Vec<MediaTag>,
    pub average_score: Option<u32>,
    pub popularity: Option<u64>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub studios: Vec<Studio>,
    pub staff: Vec<StaffCredit>,
}

impl Media {
    /// Names of credited directors. A credit counts as a director when its
    /// role string contains "director" case-insensitively; a single title
    /// may credit several.
    pub fn director_names(&self) -> Vec<&str> {
        self.staff
            .iter()
            .filter(|credit| credit.role.to_lowercase().contains("director"))
            .map(|credit| credit.name.as_str())
            .collect()
    }
}

/// Pagination metadata mirrored from the catalog API
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: u32,
    pub current_page: u32,
    pub last_page: u32,
    pub has_next_page: bool,
    pub per_page: u32,
}

/// One page of catalog results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPage {
    pub page_info: PageInfo,
    pub media: Vec<Media>,
}

impl CatalogPage {
    /// Degraded result: no items, pagination zeroed out
    pub fn empty() -> Self {
        Self {
            page_info: PageInfo::default(),
            media: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_round_trip() {
        for season in [Season::Winter, Season::Spring, Season::Summer, Season::Fall] {
            assert_eq!(season.as_str().parse::<Season>().unwrap(), season);
        }
        assert!("autumn".parse::<Season>().is_err());
    }

    #[test]
    fn test_title_display_preference() {
        let title = MediaTitle {
            romaji: None,
            english: Some("Attack on Titan".to_string()),
            native: Some("進撃の巨人".to_string()),
        };
        assert_eq!(title.display(), "Attack on Titan");
        assert_eq!(MediaTitle::default().display(), "");
    }

    #[test]
    fn test_director_names_substring_filter() {
        let media = Media {
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
            popularity: None,
            start_date: None,
            end_date: None,
            studios: Vec::new(),
            staff: vec![
                StaffCredit {
                    role: "Director".to_string(),
                    name: "A".to_string(),
                },
                StaffCredit {
                    role: "Assistant Director".to_string(),
                    name: "B".to_string(),
                },
                StaffCredit {
                    role: "Character Design".to_string(),
                    name: "C".to_string(),
                },
            ],
        };
        assert_eq!(media.director_names(), vec!["A", "B"]);
    }
}
