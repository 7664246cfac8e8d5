use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheStorage, CacheStore};
use crate::error::AppError;
use crate::http::HttpClient;
use crate::models::{GameRecord, LibraryResult, RatingTier, TargetPlatform};
use crate::protondb;

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Upper bound on rating lookups in flight. 1 resolves games one by one.
    pub concurrency: usize,
    pub platform: TargetPlatform,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            platform: TargetPlatform::Linux,
        }
    }
}

struct OwnedEntry {
    app_id: String,
    name: String,
    playtime: u64,
}

/// Rates every game of an owned-games payload, sorts by playtime and writes
/// all records to the cache in one batch. Returned records carry the cache
/// timestamp they were stored under.
///
/// A payload without a `games` list is a private profile. An empty list is a
/// valid, empty library.
pub async fn aggregate<S: CacheStorage>(
    http: &dyn HttpClient,
    cache: &mut CacheStore<S>,
    payload: &Value,
    options: AggregateOptions,
) -> Result<LibraryResult, AppError> {
    let entries = owned_entries(payload)?;
    info!(games = entries.len(), "resolving ratings");

    let shared: &CacheStore<S> = cache;
    let mut records = stream::iter(entries)
        .map(|entry| async move {
            let rating =
                protondb::resolve_rating(http, shared, &entry.app_id, options.platform).await;
            GameRecord {
                app_id: entry.app_id,
                name: entry.name,
                rating,
                playtime: entry.playtime,
                cached_at: None,
            }
        })
        .buffered(options.concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    records.sort_by(|a, b| b.playtime.cmp(&a.playtime));

    cache.update(Some(records.as_slice()), None)?;
    for record in &mut records {
        record.cached_at = cache.get_game(&record.app_id).and_then(|g| g.cached_at);
    }

    let user_average = average_rating(&records);
    debug!(average = ?user_average, "library aggregated");
    Ok(LibraryResult {
        game_ratings: records,
        user_average,
    })
}

fn owned_entries(payload: &Value) -> Result<Vec<OwnedEntry>, AppError> {
    let Some(games) = payload.get("response").and_then(|r| r.get("games")) else {
        return Err(AppError::PrivateAccount(
            "profile game details are not public".to_string(),
        ));
    };
    let games = games
        .as_array()
        .ok_or_else(|| AppError::UpstreamSchema("owned games is not an array".to_string()))?;

    let mut out = Vec::with_capacity(games.len());
    for g in games {
        let Some(app_id) = g.get("appid").and_then(Value::as_u64).filter(|id| *id != 0) else {
            continue;
        };
        out.push(OwnedEntry {
            app_id: app_id.to_string(),
            name: g
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            playtime: g
                .get("playtime_forever")
                .and_then(Value::as_u64)
                .unwrap_or_default(),
        });
    }
    Ok(out)
}

/// Mean tier weight rounded half-to-even, mapped back to a tier.
/// `None` for an empty library.
pub fn average_rating(records: &[GameRecord]) -> Option<RatingTier> {
    if records.is_empty() {
        return None;
    }
    let total: u32 = records.iter().map(|r| u32::from(r.rating.weight())).sum();
    let mean = f64::from(total) / records.len() as f64;
    RatingTier::from_weight(mean.round_ties_even() as u8)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{MemoryStorage, MockHttp};

    fn rated(rating: RatingTier) -> GameRecord {
        GameRecord {
            app_id: "1".to_string(),
            name: "x".to_string(),
            rating,
            playtime: 0,
            cached_at: None,
        }
    }

    fn average_of(tiers: &[RatingTier]) -> Option<RatingTier> {
        let records = tiers.iter().copied().map(rated).collect::<Vec<_>>();
        average_rating(&records)
    }

    /// ProtonDB and store routes for four games with distinct tiers.
    fn library_http() -> MockHttp {
        MockHttp::new()
            .route_json(
                "appdetails?appids=10&",
                200,
                &json!({"10": {"success": true, "data": {"platforms": {"linux": true}}}}),
            )
            .route_json("summaries/20.json", 200, &json!({"tier": "gold"}))
            .route_json("summaries/30.json", 200, &json!({"tier": "platinum"}))
            .route_json("summaries/40.json", 200, &json!({"tier": "borked"}))
    }

    fn library_payload() -> Value {
        json!({"response": {"game_count": 4, "games": [
            {"appid": 10, "name": "Native Game", "playtime_forever": 50},
            {"appid": 20, "name": "Gold Game", "playtime_forever": 300},
            {"appid": 30, "name": "Platinum Game", "playtime_forever": 50},
            {"appid": 40, "name": "Borked Game", "playtime_forever": 1000}
        ]}})
    }

    #[test]
    fn equal_tiers_average_to_themselves() {
        assert_eq!(
            average_of(&[RatingTier::Gold, RatingTier::Gold]),
            Some(RatingTier::Gold)
        );
    }

    #[test]
    fn halfway_means_round_to_even_weight() {
        // 4.5 -> 4
        assert_eq!(
            average_of(&[RatingTier::Gold, RatingTier::Platinum]),
            Some(RatingTier::Gold)
        );
        // 3.5 -> 4
        assert_eq!(
            average_of(&[RatingTier::Silver, RatingTier::Gold]),
            Some(RatingTier::Gold)
        );
        // 2.5 -> 2
        assert_eq!(
            average_of(&[RatingTier::Bronze, RatingTier::Silver]),
            Some(RatingTier::Bronze)
        );
    }

    #[test]
    fn non_halfway_means_round_to_nearest() {
        // (0 + 6 + 6) / 3 = 4
        assert_eq!(
            average_of(&[RatingTier::Borked, RatingTier::Native, RatingTier::Native]),
            Some(RatingTier::Gold)
        );
        // (5 + 5 + 6) / 3 = 5.33
        assert_eq!(
            average_of(&[RatingTier::Platinum, RatingTier::Platinum, RatingTier::Native]),
            Some(RatingTier::Platinum)
        );
    }

    #[test]
    fn empty_library_has_no_average() {
        assert_eq!(average_rating(&[]), None);
    }

    #[tokio::test]
    async fn missing_games_list_is_private_account() {
        let http = MockHttp::new();
        let mut cache = CacheStore::new(MemoryStorage::default());
        let err = aggregate(&http, &mut cache, &json!({"response": {}}), AggregateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PrivateAccount(_)));
    }

    #[tokio::test]
    async fn empty_games_list_is_an_empty_result() {
        let http = MockHttp::new();
        let mut cache = CacheStore::new(MemoryStorage::default());
        let payload = json!({"response": {"game_count": 0, "games": []}});
        let result = aggregate(&http, &mut cache, &payload, AggregateOptions::default())
            .await
            .unwrap();
        assert!(result.game_ratings.is_empty());
        assert_eq!(result.user_average, None);
        assert_eq!(http.call_count(), 0);
    }

    #[tokio::test]
    async fn results_sorted_by_playtime_descending_and_stable() {
        let http = library_http();
        let mut cache = CacheStore::new(MemoryStorage::default());
        let result = aggregate(&http, &mut cache, &library_payload(), AggregateOptions::default())
            .await
            .unwrap();

        let order = result
            .game_ratings
            .iter()
            .map(|g| g.app_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["40", "20", "10", "30"]);

        let tiers = result
            .game_ratings
            .iter()
            .map(|g| g.rating)
            .collect::<Vec<_>>();
        assert_eq!(
            tiers,
            vec![
                RatingTier::Borked,
                RatingTier::Gold,
                RatingTier::Native,
                RatingTier::Platinum
            ]
        );
        // (0 + 4 + 6 + 5) / 4 = 3.75
        assert_eq!(result.user_average, Some(RatingTier::Gold));
    }

    #[tokio::test]
    async fn whole_library_is_written_in_one_batch() {
        let http = library_http();
        let storage = MemoryStorage::default();
        let mut cache = CacheStore::new(storage.clone());
        let result = aggregate(&http, &mut cache, &library_payload(), AggregateOptions::default())
            .await
            .unwrap();

        assert_eq!(storage.writes(), 1);
        assert!(result.game_ratings.iter().all(|g| g.cached_at.is_some()));
        let written = storage.json();
        let cached = written["game_cache"].as_object().unwrap();
        assert_eq!(cached.len(), 4);
        assert_eq!(written["game_cache"]["20"]["rating"], "gold");
        assert_eq!(written["game_cache"]["40"]["playtime"], 1000);
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let storage = MemoryStorage::default();
        let mut cache = CacheStore::new(storage.clone());
        aggregate(&library_http(), &mut cache, &library_payload(), AggregateOptions::default())
            .await
            .unwrap();

        let mut reloaded = CacheStore::new(storage);
        reloaded.load(true).unwrap();
        let http = MockHttp::new();
        let result = aggregate(&http, &mut reloaded, &library_payload(), AggregateOptions::default())
            .await
            .unwrap();

        assert_eq!(http.call_count(), 0);
        assert_eq!(result.user_average, Some(RatingTier::Gold));
    }

    #[tokio::test]
    async fn concurrency_does_not_change_output() {
        let sequential = aggregate(
            &library_http(),
            &mut CacheStore::new(MemoryStorage::default()),
            &library_payload(),
            AggregateOptions::default(),
        )
        .await
        .unwrap();

        let fanned_out = aggregate(
            &library_http(),
            &mut CacheStore::new(MemoryStorage::default()),
            &library_payload(),
            AggregateOptions {
                concurrency: 8,
                ..AggregateOptions::default()
            },
        )
        .await
        .unwrap();

        let summary = |result: &LibraryResult| {
            result
                .game_ratings
                .iter()
                .map(|g| (g.app_id.clone(), g.rating, g.playtime))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&sequential), summary(&fanned_out));
        assert_eq!(sequential.user_average, fanned_out.user_average);
    }

    #[tokio::test]
    async fn entries_without_appid_are_skipped() {
        let http = MockHttp::new();
        let mut cache = CacheStore::new(MemoryStorage::default());
        let payload = json!({"response": {"games": [{"name": "ghost", "playtime_forever": 5}]}});
        let result = aggregate(&http, &mut cache, &payload, AggregateOptions::default())
            .await
            .unwrap();
        assert!(result.game_ratings.is_empty());
    }
}
