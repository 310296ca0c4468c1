// src/integrations/anilist/client.rs
//
// AniList API Integration
//
// ARCHITECTURE:
// - GraphQL client for AniList API
// - Handles authentication, rate limiting, pagination
// - Maps external data → internal domain records (NO domain mutation)
// - Used by DiscoveryService through the provider traits
//
// CRITICAL RULES:
// - This is INFRASTRUCTURE, not DOMAIN
// - Returns mapped records that services can validate
// - Handles all external API concerns
// - A GraphQL 404 (unknown user) surfaces as NotFound, which callers
//   translate into the empty sentinel; every other upstream failure is
//   Api, and a response we cannot decode is MalformedResponse

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::{
    CatalogPage, FuzzyDate, Media, MediaTag, MediaTitle, PageInfo, RatedEntry, RatingsPage,
    Season, StaffCredit, Studio, Trailer,
};
use crate::error::{AppError, AppResult};
use crate::integrations::{CatalogProvider, RatingsProvider};

/// Field block shared by every media-bearing query
const MEDIA_FIELDS: &str = r#"
    id
    title {
        romaji
        english
        native
    }
    description
    coverImage {
        large
    }
    bannerImage
    trailer {
        id
        site
        thumbnail
    }
    season
    seasonYear
    format
    status
    episodes
    genres
    tags {
        name
        rank
        category
    }
    averageScore
    popularity
    startDate {
        year
        month
        day
    }
    endDate {
        year
        month
        day
    }
    studios {
        nodes {
            id
            name
        }
    }
    staff {
        edges {
            role
            node {
                name {
                    full
                }
            }
        }
    }
"#;

const PAGE_INFO_FIELDS: &str = r#"
    pageInfo {
        total
        currentPage
        lastPage
        hasNextPage
        perPage
    }
"#;

/// GraphQL response wrapper
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
    status: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct PageData<T> {
    #[serde(rename = "Page")]
    page: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaPageData {
    #[serde(default)]
    page_info: PageInfoData,
    #[serde(default)]
    media: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingsPageData {
    #[serde(default)]
    page_info: PageInfoData,
    #[serde(default)]
    media_list: Vec<MediaListEntryData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfoData {
    #[serde(default)]
    total: u32,
    #[serde(default)]
    current_page: u32,
    #[serde(default)]
    last_page: u32,
    #[serde(default)]
    has_next_page: bool,
    #[serde(default)]
    per_page: u32,
}

/// Media data from AniList
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaData {
    id: i64,
    #[serde(default)]
    title: TitleData,
    description: Option<String>,
    cover_image: Option<CoverImageData>,
    banner_image: Option<String>,
    trailer: Option<TrailerData>,
    season: Option<Season>,
    season_year: Option<i32>,
    format: Option<String>,
    status: Option<String>,
    episodes: Option<u32>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    tags: Vec<TagData>,
    average_score: Option<u32>,
    popularity: Option<u64>,
    start_date: Option<DateData>,
    end_date: Option<DateData>,
    studios: Option<StudioConnectionData>,
    staff: Option<StaffConnectionData>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleData {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoverImageData {
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrailerData {
    id: Option<String>,
    site: Option<String>,
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    name: String,
    rank: Option<u32>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateData {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StudioConnectionData {
    #[serde(default)]
    nodes: Vec<StudioData>,
}

#[derive(Debug, Deserialize)]
struct StudioData {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct StaffConnectionData {
    #[serde(default)]
    edges: Vec<StaffEdgeData>,
}

#[derive(Debug, Deserialize)]
struct StaffEdgeData {
    role: Option<String>,
    node: Option<StaffNodeData>,
}

#[derive(Debug, Deserialize)]
struct StaffNodeData {
    name: Option<StaffNameData>,
}

#[derive(Debug, Deserialize)]
struct StaffNameData {
    full: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaListEntryData {
    #[serde(default)]
    score: f64,
    completed_at: Option<DateData>,
    created_at: Option<i64>,
    media: Option<MediaData>,
}

/// User lookup wrapper
#[derive(Debug, Deserialize)]
struct UserData {
    #[serde(rename = "User")]
    user: Option<UserNodeData>,
}

#[derive(Debug, Deserialize)]
struct UserNodeData {
    id: i64,
}

/// Rate limiter state
struct RateLimiter {
    next_allowed: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            next_allowed: Instant::now(),
            min_interval: Duration::from_millis(1000), // 1 request per second
        }
    }

    /// Reserve the next slot and return how long the caller must wait
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let wait = self.next_allowed.saturating_duration_since(now);
        self.next_allowed = now + wait + self.min_interval;
        wait
    }
}

/// AniList API Client
pub struct AniListClient {
    base_url: String,
    http_client: Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    auth_token: Option<String>,
}

impl AniListClient {
    /// Create a new AniList client
    pub fn new() -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: "https://graphql.anilist.co".to_string(),
            http_client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            auth_token: None,
        }
    }

    /// Create client with authentication token
    pub fn with_auth(token: String) -> Self {
        let mut client = Self::new();
        client.auth_token = Some(token);
        client
    }

    // ========================================================================
    // INTERNAL: GraphQL Execution
    // ========================================================================

    async fn throttle(&self) {
        let wait = {
            let mut limiter = self.rate_limiter.lock().unwrap();
            limiter.reserve()
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Execute a GraphQL query
    async fn execute_query<T>(&self, query: &str, variables: serde_json::Value) -> AppResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.throttle().await;

        let body = json!({
            "query": query,
            "variables": variables
        });

        let mut request = self
            .http_client
            .post(&self.base_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");

        if let Some(token) = &self.auth_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Api(format!("AniList request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Api(format!("AniList response unreadable: {}", e)))?;

        // The body is parsed even on HTTP errors: GraphQL reports "user not
        // found" as a 404 with a regular errors array
        let graphql_response: GraphQLResponse<T> = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                AppError::MalformedResponse(format!("AniList response did not parse: {}", e))
            } else {
                AppError::Api(format!("AniList returned status {}", status))
            }
        })?;

        if let Some(errors) = graphql_response.errors {
            if errors.iter().any(|e| e.status == Some(404)) {
                return Err(AppError::NotFound);
            }
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(AppError::Api(format!(
                "AniList errors: {}",
                messages.join(", ")
            )));
        }

        graphql_response
            .data
            .ok_or_else(|| AppError::MalformedResponse("AniList returned no data".to_string()))
    }

    // ========================================================================
    // INTERNAL: Mapping
    // ========================================================================

    fn map_page_info(info: PageInfoData) -> PageInfo {
        PageInfo {
            total: info.total,
            current_page: info.current_page,
            last_page: info.last_page,
            has_next_page: info.has_next_page,
            per_page: info.per_page,
        }
    }

    fn map_date(date: DateData) -> FuzzyDate {
        FuzzyDate {
            year: date.year,
            month: date.month,
            day: date.day,
        }
    }

    /// Map MediaData to the domain Media record
    fn map_media(media: MediaData) -> Media {
        let staff = media
            .staff
            .map(|connection| {
                connection
                    .edges
                    .into_iter()
                    .filter_map(|edge| {
                        let role = edge.role?;
                        let name = edge.node?.name?.full?;
                        Some(StaffCredit { role, name })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Media {
            id: media.id,
            title: MediaTitle {
                romaji: media.title.romaji,
                english: media.title.english,
                native: media.title.native,
            },
            description: media.description,
            cover_image: media.cover_image.and_then(|c| c.large),
            banner_image: media.banner_image,
            trailer: media.trailer.map(|t| Trailer {
                id: t.id,
                site: t.site,
                thumbnail: t.thumbnail,
            }),
            season: media.season,
            season_year: media.season_year,
            format: media.format,
            status: media.status,
            episodes: media.episodes,
            genres: media.genres,
            tags: media
                .tags
                .into_iter()
                .map(|t| MediaTag {
                    name: t.name,
                    rank: t.rank,
                    category: t.category,
                })
                .collect(),
            average_score: media.average_score,
            popularity: media.popularity,
            start_date: media.start_date.map(Self::map_date),
            end_date: media.end_date.map(Self::map_date),
            studios: media
                .studios
                .map(|connection| {
                    connection
                        .nodes
                        .into_iter()
                        .map(|s| Studio {
                            id: s.id,
                            name: s.name,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            staff,
        }
    }

    fn map_catalog_page(page: MediaPageData) -> CatalogPage {
        CatalogPage {
            page_info: Self::map_page_info(page.page_info),
            media: page.media.into_iter().map(Self::map_media).collect(),
        }
    }

    fn map_ratings_page(page: RatingsPageData) -> RatingsPage {
        RatingsPage {
            page_info: Self::map_page_info(page.page_info),
            media_list: page
                .media_list
                .into_iter()
                .filter_map(|entry| {
                    let media = entry.media?;
                    Some(RatedEntry {
                        media: Self::map_media(media),
                        score: entry.score,
                        completed_at: entry
                            .completed_at
                            .map(Self::map_date)
                            .and_then(|d| d.to_naive()),
                        created_at: entry.created_at,
                    })
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CatalogProvider for AniListClient {
    /// Fetch one page of a broadcast season, most popular first
    async fn seasonal_page(
        &self,
        season: Season,
        year: i32,
        page: u32,
        per_page: u32,
    ) -> AppResult<CatalogPage> {
        let query = format!(
            r#"
            query ($season: MediaSeason, $seasonYear: Int, $page: Int, $perPage: Int) {{
                Page(page: $page, perPage: $perPage) {{
                    {PAGE_INFO_FIELDS}
                    media(season: $season, seasonYear: $seasonYear, type: ANIME, sort: POPULARITY_DESC) {{
                        {MEDIA_FIELDS}
                    }}
                }}
            }}
        "#
        );

        let variables = json!({
            "season": season.as_str(),
            "seasonYear": year,
            "page": page,
            "perPage": per_page,
        });

        let data: PageData<MediaPageData> = self.execute_query(&query, variables).await?;
        Ok(Self::map_catalog_page(data.page))
    }

    /// Search the catalog by title
    async fn search_page(
        &self,
        search: &str,
        page: u32,
        per_page: u32,
    ) -> AppResult<CatalogPage> {
        let query = format!(
            r#"
            query ($search: String, $page: Int, $perPage: Int) {{
                Page(page: $page, perPage: $perPage) {{
                    {PAGE_INFO_FIELDS}
                    media(search: $search, type: ANIME) {{
                        {MEDIA_FIELDS}
                    }}
                }}
            }}
        "#
        );

        let variables = json!({
            "search": search,
            "page": page,
            "perPage": per_page,
        });

        let data: PageData<MediaPageData> = self.execute_query(&query, variables).await?;
        Ok(Self::map_catalog_page(data.page))
    }
}

#[async_trait]
impl RatingsProvider for AniListClient {
    async fn resolve_user(&self, username: &str) -> AppResult<Option<i64>> {
        let query = r#"
            query ($name: String) {
                User(name: $name) {
                    id
                }
            }
        "#;

        let variables = json!({ "name": username });

        match self.execute_query::<UserData>(query, variables).await {
            Ok(data) => Ok(data.user.map(|u| u.id)),
            Err(AppError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch one page of a user's rated list. The score comes back on the
    /// account's own scale (0-5 or 0-10).
    async fn ratings_page(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> AppResult<RatingsPage> {
        let query = format!(
            r#"
            query ($userId: Int, $page: Int, $perPage: Int) {{
                Page(page: $page, perPage: $perPage) {{
                    {PAGE_INFO_FIELDS}
                    mediaList(userId: $userId, type: ANIME, sort: UPDATED_TIME_DESC) {{
                        score
                        completedAt {{
                            year
                            month
                            day
                        }}
                        createdAt
                        media {{
                            {MEDIA_FIELDS}
                        }}
                    }}
                }}
            }}
        "#
        );

        let variables = json!({
            "userId": user_id,
            "page": page,
            "perPage": per_page,
        });

        let data: PageData<RatingsPageData> = self.execute_query(&query, variables).await?;
        Ok(Self::map_ratings_page(data.page))
    }
}

impl Default for AniListClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AniListClient::new();
        assert_eq!(client.base_url, "https://graphql.anilist.co");
        assert!(client.auth_token.is_none());
    }

    #[test]
    fn test_client_with_auth() {
        let client = AniListClient::with_auth("test_token".to_string());
        assert!(client.auth_token.is_some());
    }

    #[test]
    fn test_rate_limiter_spaces_requests() {
        let mut limiter = RateLimiter::new();
        assert!(limiter.reserve().is_zero());
        let wait = limiter.reserve();
        assert!(wait > Duration::from_millis(900));
    }

    #[test]
    fn test_map_media_from_full_payload() {
        let raw = serde_json::json!({
            "id": 21,
            "title": { "romaji": "One Piece", "english": "One Piece", "native": "ワンピース" },
            "description": "Pirates.",
            "coverImage": { "large": "https://img.example/op.png" },
            "bannerImage": null,
            "trailer": { "id": "abc", "site": "youtube", "thumbnail": null },
            "season": "FALL",
            "seasonYear": 1999,
            "format": "TV",
            "status": "RELEASING",
            "episodes": null,
            "genres": ["Action", "Adventure"],
            "tags": [ { "name": "Pirates", "rank": 95, "category": "Theme" } ],
            "averageScore": 88,
            "popularity": 500000,
            "startDate": { "year": 1999, "month": 10, "day": 20 },
            "endDate": { "year": null, "month": null, "day": null },
            "studios": { "nodes": [ { "id": 18, "name": "Toei Animation" } ] },
            "staff": { "edges": [
                { "role": "Director", "node": { "name": { "full": "Konosuke Uda" } } },
                { "role": "Original Creator", "node": { "name": { "full": "Eiichiro Oda" } } },
                { "role": "Episode Director", "node": null }
            ] }
        });
        let data: MediaData = serde_json::from_value(raw).unwrap();
        let media = AniListClient::map_media(data);

        assert_eq!(media.id, 21);
        assert_eq!(media.title.display(), "One Piece");
        assert_eq!(media.season, Some(Season::Fall));
        assert_eq!(media.genres.len(), 2);
        assert_eq!(media.tags[0].rank, Some(95));
        assert_eq!(media.studios[0].name, "Toei Animation");
        // The null staff node is dropped, the rest keep their roles
        assert_eq!(media.staff.len(), 2);
        assert_eq!(media.director_names(), vec!["Konosuke Uda"]);
        assert_eq!(media.start_date.unwrap().to_naive().unwrap().to_string(), "1999-10-20");
    }

    #[test]
    fn test_map_ratings_page_skips_null_media() {
        let raw = serde_json::json!({
            "pageInfo": { "total": 2, "currentPage": 1, "lastPage": 1, "hasNextPage": false, "perPage": 50 },
            "mediaList": [
                { "score": 9.0, "completedAt": { "year": 2024, "month": 5, "day": 1 }, "createdAt": 1700000000,
                  "media": { "id": 5114, "title": { "romaji": "Fullmetal Alchemist: Brotherhood" } } },
                { "score": 7.0, "completedAt": null, "createdAt": null, "media": null }
            ]
        });
        let data: RatingsPageData = serde_json::from_value(raw).unwrap();
        let page = AniListClient::map_ratings_page(data);

        assert_eq!(page.page_info.total, 2);
        assert_eq!(page.media_list.len(), 1);
        assert_eq!(page.media_list[0].media.id, 5114);
        assert_eq!(page.media_list[0].score, 9.0);
        assert_eq!(
            page.media_list[0].completed_at.unwrap().to_string(),
            "2024-05-01"
        );
    }

    #[test]
    fn test_graphql_404_maps_to_not_found() {
        let raw = r#"{ "data": null, "errors": [ { "message": "Not Found.", "status": 404 } ] }"#;
        let parsed: GraphQLResponse<UserData> = serde_json::from_str(raw).unwrap();
        assert!(parsed.errors.unwrap().iter().any(|e| e.status == Some(404)));
    }

    // Note: Real API tests would be in integration test suite
    // and would use mocked responses or test against real API
}
