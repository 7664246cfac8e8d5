use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::{CacheStorage, CacheStore};
use crate::http::HttpClient;
use crate::models::{RatingTier, TargetPlatform};
use crate::steam;

const SUMMARY_URL: &str = "https://www.protondb.com/api/v1/reports/summaries";

#[derive(Debug, Deserialize)]
struct ReportSummary {
    tier: Option<String>,
}

/// Resolves one game's rating: cached value, then native support, then the
/// ProtonDB summary. Never fails; anything unknown becomes `Pending`.
///
/// Cached records are trusted as-is; their age was checked when the cache
/// was loaded.
pub async fn resolve_rating<S: CacheStorage>(
    http: &dyn HttpClient,
    cache: &CacheStore<S>,
    app_id: &str,
    platform: TargetPlatform,
) -> RatingTier {
    if let Some(game) = cache.get_game(app_id) {
        debug!(app_id, rating = %game.rating, "rating served from cache");
        return game.rating;
    }

    if steam::check_native(http, app_id, platform).await {
        return RatingTier::Native;
    }

    fetch_summary_tier(http, app_id).await
}

async fn fetch_summary_tier(http: &dyn HttpClient, app_id: &str) -> RatingTier {
    let url = format!("{SUMMARY_URL}/{app_id}.json");
    let response = match http.get(&url).await {
        Ok(response) => response,
        Err(e) => {
            warn!(app_id, error = %e, "protondb lookup failed; rating pending");
            return RatingTier::Pending;
        }
    };
    if !response.is_success() {
        debug!(app_id, status = response.status.as_u16(), "no protondb summary");
        return RatingTier::Pending;
    }

    let summary: ReportSummary = match serde_json::from_str(&response.body) {
        Ok(summary) => summary,
        Err(e) => {
            warn!(app_id, error = %e, "protondb summary unparsable; rating pending");
            return RatingTier::Pending;
        }
    };

    match summary.tier {
        Some(tier) => tier.parse().unwrap_or_else(|_| {
            warn!(app_id, tier = %tier, "unknown protondb tier; rating pending");
            RatingTier::Pending
        }),
        None => RatingTier::Pending,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::GameRecord;
    use crate::testing::{MemoryStorage, MockHttp};

    fn empty_cache() -> CacheStore<MemoryStorage> {
        CacheStore::new(MemoryStorage::default())
    }

    fn not_native(app_id: &str) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(
            app_id.to_string(),
            json!({"success": true, "data": {"platforms": {"linux": false}}}),
        );
        serde_json::Value::Object(body)
    }

    #[tokio::test]
    async fn cached_rating_wins_without_network() {
        let mut cache = empty_cache();
        cache
            .update(
                Some(&[GameRecord {
                    app_id: "227300".to_string(),
                    name: "Euro Truck Simulator 2".to_string(),
                    rating: RatingTier::Native,
                    playtime: 12933,
                    cached_at: None,
                }]),
                None,
            )
            .unwrap();

        let http = MockHttp::new();
        let rating = resolve_rating(&http, &cache, "227300", TargetPlatform::Linux).await;
        assert_eq!(rating, RatingTier::Native);
        assert_eq!(http.call_count(), 0);
    }

    #[tokio::test]
    async fn native_games_skip_protondb() {
        let http = MockHttp::new().route_json(
            "appdetails",
            200,
            &json!({"10": {"success": true, "data": {"platforms": {"linux": true}}}}),
        );
        let rating = resolve_rating(&http, &empty_cache(), "10", TargetPlatform::Linux).await;
        assert_eq!(rating, RatingTier::Native);
        assert_eq!(http.calls_matching("protondb"), 0);
    }

    #[tokio::test]
    async fn protondb_tier_is_used() {
        let http = MockHttp::new()
            .route_json("appdetails", 200, &not_native("20"))
            .route_json(
                "summaries/20.json",
                200,
                &json!({"tier": "gold", "bestReportedTier": "platinum", "total": 12}),
            );
        let rating = resolve_rating(&http, &empty_cache(), "20", TargetPlatform::Linux).await;
        assert_eq!(rating, RatingTier::Gold);
    }

    #[tokio::test]
    async fn missing_summary_is_pending() {
        let http = MockHttp::new().route_json("appdetails", 200, &not_native("30"));
        let rating = resolve_rating(&http, &empty_cache(), "30", TargetPlatform::Linux).await;
        assert_eq!(rating, RatingTier::Pending);
    }

    #[tokio::test]
    async fn summary_without_tier_is_pending() {
        let http = MockHttp::new()
            .route_json("appdetails", 200, &not_native("40"))
            .route_json("summaries/40.json", 200, &json!({"total": 0}));
        let rating = resolve_rating(&http, &empty_cache(), "40", TargetPlatform::Linux).await;
        assert_eq!(rating, RatingTier::Pending);
    }

    #[tokio::test]
    async fn unknown_tier_and_transport_errors_are_pending() {
        let http = MockHttp::new()
            .route_json("appdetails", 200, &not_native("50"))
            .route_json("summaries/50.json", 200, &json!({"tier": "mythic"}))
            .route_error("summaries/60.json", "connection reset");
        let cache = empty_cache();
        assert_eq!(
            resolve_rating(&http, &cache, "50", TargetPlatform::Linux).await,
            RatingTier::Pending
        );
        assert_eq!(
            resolve_rating(&http, &cache, "60", TargetPlatform::Linux).await,
            RatingTier::Pending
        );
    }
}
