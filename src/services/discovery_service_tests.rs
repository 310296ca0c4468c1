// src/services/discovery_service_tests.rs
//
// UNIT TESTS: Ranking Orchestration
//
// PURPOSE:
// - Prove catalog fetches are cache-first and retried with backoff
// - Prove the degraded path returns an empty page with the error attached
// - Prove profiles are read-through and write-through across both layers
// - Prove ranking surfaces top picks first and combines users by mean
//
// Providers are mocked; the cache store runs on an in-memory database.

#[cfg(test)]
mod orchestration_tests {
    use std::sync::Arc;

    use crate::cache::{create_memory_pool, CacheKey, CacheStore, CachedPayload};
    use crate::domain::{
        CatalogPage, Media, MediaTitle, PageInfo, RatedEntry, RatingsPage, Season, Studio,
    };
    use crate::error::AppError;
    use crate::integrations::{
        CatalogProvider, MockCatalogProvider, MockRatingsProvider, RatingsProvider,
    };
    use crate::services::discovery_service::{DiscoveryConfig, DiscoveryService};

    fn cache() -> Arc<CacheStore> {
        let store = CacheStore::new(Arc::new(create_memory_pool().unwrap()));
        store.initialize().unwrap();
        Arc::new(store)
    }

    fn test_config() -> DiscoveryConfig {
        DiscoveryConfig {
            max_rating_pages: 10,
            ratings_per_page: 50,
            fetch_attempts: 3,
            backoff_base_ms: 1,
        }
    }

    fn media(id: i64, title: &str, popularity: u64) -> Media {
        Media {
            id,
            title: MediaTitle {
                romaji: Some(title.to_string()),
                english: None,
                native: None,
            },
            description: None,
            cover_image: None,
            banner_image: None,
            trailer: None,
            season: Some(Season::Winter),
            season_year: Some(2026),
            format: None,
            status: None,
            episodes: None,
            genres: Vec::new(),
            tags: Vec::new(),
            average_score: None,
            popularity: Some(popularity),
            start_date: None,
            end_date: None,
            studios: Vec::new(),
            staff: Vec::new(),
        }
    }

    fn catalog_page(media: Vec<Media>) -> CatalogPage {
        CatalogPage {
            page_info: PageInfo {
                total: media.len() as u32,
                current_page: 1,
                last_page: 1,
                has_next_page: false,
                per_page: 50,
            },
            media,
        }
    }

    fn rated(id: i64, title: &str, score: f64) -> RatedEntry {
        RatedEntry {
            media: media(id, title, 1_000),
            score,
            completed_at: None,
            created_at: None,
        }
    }

    fn ratings_page(entries: Vec<RatedEntry>, has_next_page: bool) -> RatingsPage {
        RatingsPage {
            page_info: PageInfo {
                total: entries.len() as u32,
                current_page: 1,
                last_page: if has_next_page { 2 } else { 1 },
                has_next_page,
                per_page: 50,
            },
            media_list: entries,
        }
    }

    fn service(
        catalog: MockCatalogProvider,
        ratings: MockRatingsProvider,
        store: Arc<CacheStore>,
    ) -> DiscoveryService {
        DiscoveryService::with_config(
            Arc::new(catalog) as Arc<dyn CatalogProvider>,
            Arc::new(ratings) as Arc<dyn RatingsProvider>,
            store,
            test_config(),
        )
    }

    #[tokio::test]
    async fn test_seasonal_page_fetched_once_then_cached() {
        let mut catalog = MockCatalogProvider::new();
        let page = catalog_page(vec![media(1, "Solo Show", 1_000)]);
        catalog
            .expect_seasonal_page()
            .times(1)
            .returning(move |_, _, _, _| Ok(page.clone()));

        let svc = service(catalog, MockRatingsProvider::new(), cache());

        let first = svc.seasonal_page(Season::Winter, 2026, 1, 50).await.unwrap();
        let second = svc.seasonal_page(Season::Winter, 2026, 1, 50).await.unwrap();

        assert_eq!(first.media.len(), 1);
        assert_eq!(second.media[0].id, 1);
    }

    #[tokio::test]
    async fn test_catalog_fetch_retries_with_backoff() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_seasonal_page()
            .times(2)
            .returning(|_, _, _, _| Err(AppError::Api("flaky upstream".to_string())));
        let page = catalog_page(vec![media(1, "Third Time Lucky", 1_000)]);
        catalog
            .expect_seasonal_page()
            .times(1)
            .returning(move |_, _, _, _| Ok(page.clone()));

        let svc = service(catalog, MockRatingsProvider::new(), cache());

        let fetched = svc.seasonal_page(Season::Winter, 2026, 1, 50).await.unwrap();
        assert_eq!(fetched.media[0].id, 1);
    }

    #[tokio::test]
    async fn test_degraded_page_past_retry_cap() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_seasonal_page()
            .times(3)
            .returning(|_, _, _, _| Err(AppError::Api("upstream down".to_string())));

        let svc = service(catalog, MockRatingsProvider::new(), cache());

        let ranked = svc
            .discover_season(Season::Winter, 2026, 1, 50, &[])
            .await;

        assert!(ranked.items.is_empty());
        assert_eq!(ranked.page_info.total, 0);
        assert_eq!(ranked.page_info.current_page, 0);
        assert!(ranked.error.is_some());
    }

    #[tokio::test]
    async fn test_contract_violation_is_not_retried() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_seasonal_page()
            .times(1)
            .returning(|_, _, _, _| {
                Err(AppError::MalformedResponse("missing media".to_string()))
            });

        let svc = service(catalog, MockRatingsProvider::new(), cache());

        let result = svc.seasonal_page(Season::Winter, 2026, 1, 50).await;
        assert!(matches!(result, Err(AppError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_resolves_to_empty_profile() {
        let mut ratings = MockRatingsProvider::new();
        ratings
            .expect_resolve_user()
            .times(1)
            .returning(|_| Ok(None));

        let svc = service(MockCatalogProvider::new(), ratings, cache());

        let profile = svc.preference_profile("ghost").await.unwrap();
        assert!(profile.is_empty());

        // An empty profile leaves candidates at their base score
        let ranked = svc
            .rank_page(
                catalog_page(vec![media(1, "Anything", 10_000)]),
                &["ghost".to_string()],
            )
            .await;
        let item = &ranked.items[0];
        assert_eq!(item.users.len(), 1);
        assert!((item.users[0].score - item.users[0].breakdown.base_score).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_profile_read_through_and_write_through() {
        let store = cache();

        let mut ratings = MockRatingsProvider::new();
        ratings
            .expect_resolve_user()
            .times(1)
            .returning(|_| Ok(Some(7)));
        let mut history = rated(42, "Loved Show", 5.0);
        history.media.genres = vec!["Action".to_string()];
        let page = ratings_page(vec![history], false);
        ratings
            .expect_ratings_page()
            .times(1)
            .returning(move |_, _, _| Ok(page.clone()));

        let svc = service(MockCatalogProvider::new(), ratings, Arc::clone(&store));

        let first = svc.preference_profile("senpai").await.unwrap();
        assert!(!first.is_empty());

        // Second call: memory hit, no further provider calls (times(1) above)
        let second = svc.preference_profile("senpai").await.unwrap();
        assert_eq!(first, second);

        // Write-through: the durable layer holds the same profile
        let Some(CachedPayload::Profile(stored)) =
            store.load(&CacheKey::preference_profile("senpai"))
        else {
            panic!("profile missing from the durable cache");
        };
        assert_eq!(stored, first);

        // A fresh service over the same store reads it without any fetch
        let svc2 = service(
            MockCatalogProvider::new(),
            MockRatingsProvider::new(),
            Arc::clone(&store),
        );
        let third = svc2.preference_profile("senpai").await.unwrap();
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn test_rating_pages_fetched_sequentially_until_done() {
        let store = cache();

        let mut ratings = MockRatingsProvider::new();
        ratings
            .expect_resolve_user()
            .times(1)
            .returning(|_| Ok(Some(7)));
        ratings
            .expect_ratings_page()
            .times(2)
            .returning(|_, page, _| {
                if page == 1 {
                    Ok(ratings_page(vec![rated(1, "First Show", 4.0)], true))
                } else {
                    Ok(ratings_page(vec![rated(2, "Second Show", 3.0)], false))
                }
            });

        let svc = service(MockCatalogProvider::new(), ratings, Arc::clone(&store));

        let history = svc.user_ratings("senpai").await.unwrap();
        assert_eq!(history.len(), 2);

        // The merged snapshot is cached: a second call stays off the network
        let again = svc.user_ratings("senpai").await.unwrap();
        assert_eq!(again.len(), 2);
    }

    #[tokio::test]
    async fn test_rating_pagination_respects_hard_cap() {
        let mut config = test_config();
        config.max_rating_pages = 2;

        let mut ratings = MockRatingsProvider::new();
        ratings
            .expect_resolve_user()
            .times(1)
            .returning(|_| Ok(Some(7)));
        // The upstream claims more pages forever; the cap must stop us
        ratings
            .expect_ratings_page()
            .times(2)
            .returning(|_, page, _| {
                Ok(ratings_page(
                    vec![rated(page as i64, &format!("Show {}", page), 4.0)],
                    true,
                ))
            });

        let svc = DiscoveryService::with_config(
            Arc::new(MockCatalogProvider::new()) as Arc<dyn CatalogProvider>,
            Arc::new(ratings) as Arc<dyn RatingsProvider>,
            cache(),
            config,
        );

        let history = svc.user_ratings("senpai").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_ranking_surfaces_designated_top_pick_first() {
        let store = cache();

        let mut ratings = MockRatingsProvider::new();
        ratings
            .expect_resolve_user()
            .times(1)
            .returning(|_| Ok(Some(7)));
        // The user's one 5-star title doubles as the designated top pick
        let page = ratings_page(vec![rated(100, "Sleeper Hit", 5.0)], false);
        ratings
            .expect_ratings_page()
            .times(1)
            .returning(move |_, _, _| Ok(page.clone()));

        let svc = service(MockCatalogProvider::new(), ratings, Arc::clone(&store));

        // The top pick has a far smaller base score than the others
        let candidates = catalog_page(vec![
            media(2, "Blockbuster", 100_000),
            media(100, "Sleeper Hit", 10),
            media(3, "Crowd Pleaser", 50_000),
        ]);
        let ranked = svc.rank_page(candidates, &["senpai".to_string()]).await;

        assert_eq!(ranked.items[0].media.id, 100);
        // The rest fall back to combined-score order
        assert_eq!(ranked.items[1].media.id, 2);
        assert_eq!(ranked.items[2].media.id, 3);

        // Per-item combined scores are cached for the group
        let key = CacheKey::combined_score(2, &["senpai".to_string()]);
        assert!(matches!(
            store.load(&key),
            Some(CachedPayload::Combined(_))
        ));
    }

    #[tokio::test]
    async fn test_multi_user_combination_is_arithmetic_mean() {
        let store = cache();

        let mut ratings = MockRatingsProvider::new();
        ratings
            .expect_resolve_user()
            .times(2)
            .returning(|name| Ok(Some(if name == "a" { 1 } else { 2 })));
        ratings
            .expect_ratings_page()
            .times(2)
            .returning(|user_id, _, _| {
                let (bones_score, ufotable_score) =
                    if user_id == 1 { (5.0, 1.0) } else { (1.0, 5.0) };
                let mut loves = rated(501, "Alpha Show", bones_score);
                loves.media.studios = vec![Studio {
                    id: 10,
                    name: "Bones".to_string(),
                }];
                let mut hates = rated(502, "Beta Show", ufotable_score);
                hates.media.studios = vec![Studio {
                    id: 11,
                    name: "Ufotable".to_string(),
                }];
                Ok(ratings_page(vec![loves, hates], false))
            });

        let svc = service(MockCatalogProvider::new(), ratings, Arc::clone(&store));

        let mut candidate = media(900, "New Bones Show", 10_000);
        candidate.studios = vec![Studio {
            id: 10,
            name: "Bones".to_string(),
        }];
        let ranked = svc
            .rank_page(
                catalog_page(vec![candidate]),
                &["a".to_string(), "b".to_string()],
            )
            .await;

        let item = &ranked.items[0];
        assert_eq!(item.users.len(), 2);

        let base = (10_000f64 + 1.0).log10() * 2.0;
        let expected_mean = (item.users[0].score + item.users[1].score) / 2.0;
        assert!((item.combined.score - expected_mean).abs() < 1e-9);
        // Opposite preferences cancel; the mean collapses to the shared base
        assert!((item.combined.score - base).abs() < 1e-9);
        assert!((item.combined.breakdown.base_score - base).abs() < 1e-9);
        assert!(item.combined.breakdown.studio_score.abs() < 1e-9);
    }
}
