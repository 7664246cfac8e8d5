//! JSON file cache for game ratings and the anti-cheat snapshot.
//!
//! Reads are tolerant: a missing or corrupt file behaves like a cold cache.
//! Writes go through a sibling temp file renamed over the target, and
//! failures surface as `AppError::Cache`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::{AntiCheatRecord, AntiCheatStatus, GameRecord, RatingTier};

pub const CACHE_TTL_DAYS: i64 = 7;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte-level backing store for a [`CacheStore`].
pub trait CacheStorage {
    /// Returns `None` when nothing is stored or the backing store is unreadable.
    fn read(&self) -> Option<Vec<u8>>;
    fn write(&self, bytes: &[u8]) -> Result<(), AppError>;
}

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the cache file. Returns whether a file was there.
    pub fn clear(&self) -> Result<bool, AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheStorage for FileStorage {
    fn read(&self) -> Option<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file unreadable; treating as empty");
                None
            }
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }

        #[cfg(windows)]
        {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredGame {
    name: String,
    rating: RatingTier,
    #[serde(default)]
    playtime: u64,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct StoredAntiCheat {
    data: BTreeMap<String, String>,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct CacheFile {
    game_cache: Option<BTreeMap<String, StoredGame>>,
    anticheat_cache: Option<StoredAntiCheat>,
}

#[derive(Serialize)]
struct CacheFileOut<'a> {
    game_cache: &'a BTreeMap<String, StoredGame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anticheat_cache: Option<AntiCheatOut<'a>>,
}

#[derive(Serialize)]
struct AntiCheatOut<'a> {
    data: BTreeMap<&'a str, &'static str>,
    timestamp: &'a str,
}

pub struct CacheStore<S> {
    storage: S,
    games: BTreeMap<String, StoredGame>,
    anticheat: BTreeMap<String, AntiCheatStatus>,
    anticheat_timestamp: String,
}

impl<S: CacheStorage> CacheStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            games: BTreeMap::new(),
            anticheat: BTreeMap::new(),
            anticheat_timestamp: String::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Loads persisted state into memory, pruning stale entries first when
    /// `prune` is set. Unreadable or malformed content leaves memory as is.
    pub fn load(&mut self, prune: bool) -> Result<&mut Self, AppError> {
        if prune {
            self.prune()?;
        }

        let Some(bytes) = self.storage.read() else {
            return Ok(self);
        };
        let file: CacheFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "cache file is malformed; continuing with a cold cache");
                return Ok(self);
            }
        };

        if let Some(games) = file.game_cache {
            self.games = games;
        }

        if let Some(snapshot) = file.anticheat_cache {
            let parsed = snapshot
                .data
                .iter()
                .map(|(app_id, raw)| {
                    raw.parse::<AntiCheatStatus>()
                        .map(|status| (app_id.clone(), status))
                })
                .collect::<Result<BTreeMap<_, _>, AppError>>();
            match parsed {
                Ok(map) => {
                    self.anticheat = map;
                    self.anticheat_timestamp = snapshot.timestamp;
                }
                Err(e) => {
                    warn!(error = %e, "cached anti-cheat snapshot rejected");
                    self.anticheat.clear();
                    self.anticheat_timestamp.clear();
                }
            }
        }

        debug!(
            games = self.games.len(),
            anticheat = self.anticheat.len(),
            "cache loaded"
        );
        Ok(self)
    }

    /// Drops game records older than the TTL (or with unparsable timestamps)
    /// and the whole anti-cheat snapshot if its timestamp is stale, then
    /// rewrites the file. Operates on the raw file, not on memory.
    pub fn prune(&mut self) -> Result<&mut Self, AppError> {
        let Some(bytes) = self.storage.read() else {
            return Ok(self);
        };
        let Ok(Value::Object(mut root)) = serde_json::from_slice::<Value>(&bytes) else {
            debug!("cache file is not a JSON object; skipping prune");
            return Ok(self);
        };

        let now = Local::now().naive_local();
        let mut pruned_games = 0usize;

        if let Some(Value::Object(games)) = root.get_mut("game_cache") {
            games.retain(|app_id, entry| {
                let fresh = is_fresh(entry.get("timestamp"), now);
                if !fresh {
                    debug!(app_id = %app_id, "pruning stale game record");
                    pruned_games += 1;
                }
                fresh
            });
        }

        let anticheat_stale = root
            .get("anticheat_cache")
            .is_some_and(|snapshot| !is_fresh(snapshot.get("timestamp"), now));
        if anticheat_stale {
            root.remove("anticheat_cache");
        }

        if pruned_games > 0 || anticheat_stale {
            info!(
                games = pruned_games,
                anticheat = anticheat_stale,
                "pruned stale cache entries"
            );
        }

        self.storage.write(&serde_json::to_vec(&Value::Object(root))?)?;
        Ok(self)
    }

    pub fn get_game(&self, app_id: &str) -> Option<GameRecord> {
        self.games.get(app_id).map(|stored| to_record(app_id, stored))
    }

    pub fn get_anticheat(&self, app_id: &str) -> Option<AntiCheatRecord> {
        self.anticheat.get(app_id).map(|status| AntiCheatRecord {
            app_id: app_id.to_string(),
            status: *status,
        })
    }

    pub fn has_game_cache(&self) -> bool {
        !self.games.is_empty()
    }

    pub fn has_anticheat_cache(&self) -> bool {
        !self.anticheat.is_empty()
    }

    pub fn games(&self) -> impl Iterator<Item = GameRecord> + '_ {
        self.games
            .iter()
            .map(|(app_id, stored)| to_record(app_id, stored))
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn anticheat_count(&self) -> usize {
        self.anticheat.len()
    }

    /// Merges `games` into the latest persisted state and, if given, replaces
    /// the anti-cheat snapshot wholesale. Existing game records keep their
    /// original `cached_at`. The full state is then written back.
    pub fn update(
        &mut self,
        games: Option<&[GameRecord]>,
        anticheat: Option<&[AntiCheatRecord]>,
    ) -> Result<&mut Self, AppError> {
        self.load(true)?;
        let now = now_timestamp();

        for game in games.unwrap_or_default() {
            match self.games.get_mut(&game.app_id) {
                Some(existing) => {
                    existing.name = game.name.clone();
                    existing.rating = game.rating;
                    existing.playtime = game.playtime;
                }
                None => {
                    self.games.insert(
                        game.app_id.clone(),
                        StoredGame {
                            name: game.name.clone(),
                            rating: game.rating,
                            playtime: game.playtime,
                            timestamp: now.clone(),
                        },
                    );
                }
            }
        }

        if let Some(records) = anticheat {
            self.anticheat = records
                .iter()
                .map(|record| (record.app_id.clone(), record.status))
                .collect();
            self.anticheat_timestamp = now;
        }

        self.persist()?;
        Ok(self)
    }

    fn persist(&self) -> Result<(), AppError> {
        let anticheat_cache = (!self.anticheat.is_empty()).then(|| AntiCheatOut {
            data: self
                .anticheat
                .iter()
                .map(|(app_id, status)| (app_id.as_str(), status.as_str()))
                .collect(),
            timestamp: &self.anticheat_timestamp,
        });
        let out = CacheFileOut {
            game_cache: &self.games,
            anticheat_cache,
        };
        self.storage.write(&serde_json::to_vec(&out)?)
    }
}

fn to_record(app_id: &str, stored: &StoredGame) -> GameRecord {
    GameRecord {
        app_id: app_id.to_string(),
        name: stored.name.clone(),
        rating: stored.rating,
        playtime: stored.playtime,
        cached_at: parse_timestamp(&stored.timestamp),
    }
}

fn is_fresh(timestamp: Option<&Value>, now: NaiveDateTime) -> bool {
    timestamp
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .is_some_and(|ts| (now - ts).num_days() <= CACHE_TTL_DAYS)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}
