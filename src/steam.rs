use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::AppError;
use crate::http::HttpClient;
use crate::models::TargetPlatform;

const STEAM_ID_LENGTH: usize = 17;
const STEAM_ID_PREFIX: &str = "76561198";

const RESOLVE_VANITY_URL: &str = "https://api.steampowered.com/ISteamUser/ResolveVanityURL/v1/";
const OWNED_GAMES_URL: &str = "https://api.steampowered.com/IPlayerService/GetOwnedGames/v1/";
const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";

/// Accepts a bare id, a vanity name, or a steamcommunity.com profile URL and
/// returns the id/vanity part.
pub fn normalize_user_input(input: &str) -> String {
    let trimmed = input.trim();
    if let Ok(url) = Url::parse(trimmed) {
        let is_community = url
            .host_str()
            .is_some_and(|host| host.trim_start_matches("www.") == "steamcommunity.com");
        if is_community {
            let mut segments = url
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
                .unwrap_or_default();
            if segments.len() >= 2 && matches!(segments[0], "profiles" | "id") {
                return segments.swap_remove(1).to_string();
            }
        }
    }
    trimmed.to_string()
}

pub fn is_canonical_id(user: &str) -> bool {
    user.chars().count() == STEAM_ID_LENGTH && user.starts_with(STEAM_ID_PREFIX)
}

/// Turns a user identifier into a canonical 64-bit Steam id, resolving vanity
/// names through the Web API when needed.
pub async fn resolve_steam_id(
    http: &dyn HttpClient,
    api_key: &str,
    user: &str,
) -> Result<String, AppError> {
    if is_canonical_id(user) {
        return Ok(user.to_string());
    }
    resolve_vanity(http, api_key, user).await
}

async fn resolve_vanity(
    http: &dyn HttpClient,
    api_key: &str,
    vanity: &str,
) -> Result<String, AppError> {
    let mut url =
        Url::parse(RESOLVE_VANITY_URL).map_err(|e| AppError::Internal(e.to_string()))?;
    {
        let mut qp = url.query_pairs_mut();
        qp.append_pair("key", api_key);
        qp.append_pair("vanityurl", vanity);
    }

    let response = http.get(url.as_str()).await?;
    if response.status == StatusCode::FORBIDDEN {
        return Err(AppError::Unauthorized("steam api key rejected".to_string()));
    }

    let json: Value = serde_json::from_str(&response.body).map_err(|e| {
        AppError::UpstreamSchema(format!("resolve vanity response unparsable: {e}"))
    })?;
    let Some(body) = json.get("response") else {
        return Err(AppError::InvalidId(format!("vanity '{vanity}' not found")));
    };

    if body.get("success").and_then(Value::as_i64) != Some(1) {
        return Err(AppError::InvalidId(format!("vanity '{vanity}' not found")));
    }

    let steamid = body.get("steamid").and_then(Value::as_str).ok_or_else(|| {
        AppError::UpstreamSchema("steamid missing in vanity response".to_string())
    })?;

    debug!(vanity, steamid, "resolved vanity name");
    Ok(steamid.to_string())
}

/// Fetches the raw owned-games payload. Interpretation of the payload is left
/// to the library aggregator.
pub async fn fetch_owned_games(
    http: &dyn HttpClient,
    api_key: &str,
    steamid: &str,
) -> Result<Value, AppError> {
    let mut url = Url::parse(OWNED_GAMES_URL).map_err(|e| AppError::Internal(e.to_string()))?;
    {
        let mut qp = url.query_pairs_mut();
        qp.append_pair("key", api_key);
        qp.append_pair("steamid", steamid);
        qp.append_pair("include_appinfo", "1");
        qp.append_pair("include_played_free_games", "1");
        qp.append_pair("format", "json");
    }

    let response = http.get(url.as_str()).await?;
    match response.status {
        StatusCode::BAD_REQUEST => {
            return Err(AppError::InvalidId(format!("steam id '{steamid}' rejected")));
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(AppError::Unauthorized("steam api key rejected".to_string()));
        }
        status if !status.is_success() => {
            return Err(AppError::Network(format!(
                "owned games request failed with status {status}"
            )));
        }
        _ => {}
    }

    serde_json::from_str(&response.body)
        .map_err(|e| AppError::UpstreamSchema(format!("owned games response unparsable: {e}")))
}

/// Whether the store lists first-party support for `platform`.
///
/// Any failure answers `false`; a failed lookup never counts as native.
pub async fn check_native(http: &dyn HttpClient, app_id: &str, platform: TargetPlatform) -> bool {
    let mut url = match Url::parse(APP_DETAILS_URL) {
        Ok(url) => url,
        Err(_) => return false,
    };
    url.query_pairs_mut()
        .append_pair("appids", app_id)
        .append_pair("filters", "platforms");

    let response = match http.get(url.as_str()).await {
        Ok(response) => response,
        Err(e) => {
            warn!(app_id, error = %e, "platform lookup failed; assuming not native");
            return false;
        }
    };
    if !response.is_success() {
        debug!(app_id, status = response.status.as_u16(), "platform lookup non-success");
        return false;
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(json) => extract_native(&json, app_id, platform),
        Err(e) => {
            warn!(app_id, error = %e, "platform response unparsable; assuming not native");
            false
        }
    }
}

fn extract_native(json: &Value, app_id: &str, platform: TargetPlatform) -> bool {
    let Some(app) = json.get(app_id) else {
        return false;
    };
    if !app.get("success").and_then(Value::as_bool).unwrap_or(false) {
        return false;
    }
    app.get("data")
        .and_then(|d| d.get("platforms"))
        .and_then(|p| p.get(platform.key()))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
