use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheStorage, CacheStore};
use crate::error::AppError;
use crate::http::HttpClient;
use crate::models::{AntiCheatRecord, AntiCheatStatus};

const TRACKER_URL: &str =
    "https://raw.githubusercontent.com/AreWeAntiCheatYet/AreWeAntiCheatYet/master/games.json";
const STORE_KEY: &str = "steam";

/// Makes sure `cache` holds an anti-cheat snapshot.
///
/// A non-empty cached snapshot is returned untouched. Otherwise the tracker is
/// fetched and written as one batch. `Ok(None)` means the data is unavailable
/// for this call; only cache write failures are errors.
pub async fn refresh<'a, S: CacheStorage>(
    http: &dyn HttpClient,
    cache: &'a mut CacheStore<S>,
) -> Result<Option<&'a CacheStore<S>>, AppError> {
    if cache.has_anticheat_cache() {
        debug!(entries = cache.anticheat_count(), "anti-cheat snapshot served from cache");
        return Ok(Some(&*cache));
    }

    let response = match http.get(TRACKER_URL).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "anti-cheat tracker unreachable");
            return Ok(None);
        }
    };
    if !response.is_success() {
        warn!(status = response.status.as_u16(), "anti-cheat tracker returned non-success");
        return Ok(None);
    }

    let records = match parse_tracker(&response.body) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "anti-cheat tracker data rejected");
            return Ok(None);
        }
    };

    info!(entries = records.len(), "anti-cheat snapshot refreshed");
    cache.update(None, Some(records.as_slice()))?;
    Ok(Some(&*cache))
}

/// Keeps Steam entries only; other entries are skipped before any field is
/// checked. A missing or unrecognized status on a Steam entry rejects the
/// whole feed.
fn parse_tracker(body: &str) -> Result<Vec<AntiCheatRecord>, AppError> {
    let entries: Vec<Value> = serde_json::from_str(body)?;

    let mut records = Vec::new();
    for entry in &entries {
        let Some(app_id) = entry
            .get("storeIds")
            .and_then(|ids| ids.get(STORE_KEY))
            .and_then(store_id)
        else {
            continue;
        };
        let status = entry
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::UpstreamSchema(format!("tracker entry {app_id} has no status"))
            })?
            .parse::<AntiCheatStatus>()?;
        records.push(AntiCheatRecord { app_id, status });
    }
    Ok(records)
}

fn store_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
