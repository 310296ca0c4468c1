// src/main.rs
//
// Wiring shell: builds the engine and prints one ranked discovery page.
// Usage: aniscout [SEASON] [YEAR] [username ...]

use std::sync::Arc;

use aniscout::cache::{create_connection_pool, CacheStore};
use aniscout::domain::Season;
use aniscout::integrations::{AniListClient, CatalogProvider, RatingsProvider};
use aniscout::services::DiscoveryService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. ARGUMENTS
    let mut args = std::env::args().skip(1);
    let season: Season = args.next().unwrap_or_else(|| "WINTER".to_string()).parse()?;
    let year: i32 = args.next().unwrap_or_else(|| "2026".to_string()).parse()?;
    let usernames: Vec<String> = args.collect();

    // 2. INFRASTRUCTURE
    let pool = Arc::new(create_connection_pool()?);
    let cache = Arc::new(CacheStore::new(pool));
    cache.initialize()?;

    // 3. PROVIDERS
    let client = Arc::new(AniListClient::new());
    let catalog: Arc<dyn CatalogProvider> = client.clone();
    let ratings: Arc<dyn RatingsProvider> = client;

    // 4. SERVICE
    let discovery = DiscoveryService::new(catalog, ratings, cache);

    // 5. ONE RANKED PAGE
    let ranked = discovery
        .discover_season(season, year, 1, 50, &usernames)
        .await;

    if let Some(error) = &ranked.error {
        eprintln!("discovery degraded to an empty page: {}", error);
    }

    println!(
        "{} {} — page {}/{} ({} titles)",
        season,
        year,
        ranked.page_info.current_page,
        ranked.page_info.last_page,
        ranked.items.len()
    );

    for (rank, item) in ranked.items.iter().enumerate() {
        println!(
            "{:>3}. {:<50} combined {:>6.2} (base {:>5.2})",
            rank + 1,
            item.media.title.display(),
            item.combined.score,
            item.combined.breakdown.base_score
        );
        for user in &item.users {
            println!(
                "       {:<16} {:>6.2} (studio {:+.2}, director {:+.2}, genre {:+.2}, tag {:+.2})",
                user.username,
                user.score,
                user.breakdown.studio_score,
                user.breakdown.director_score,
                user.breakdown.genre_score,
                user.breakdown.tag_score
            );
        }
    }

    Ok(())
}
