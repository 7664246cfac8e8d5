use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    LocalCache,
    LocalConfig,
    SteamWebapi,
    Internal,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
    pub returned: usize,
    pub has_more: bool,
    pub total: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub version: &'static str,
    pub source: DataSource,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub pagination: Option<Pagination>,
    pub meta: Meta,
    pub error: Option<ErrorBody>,
}

/// ProtonDB compatibility tier, ordered from worst to best.
///
/// The weight is only used for sorting and averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingTier {
    Borked,
    Pending,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Native,
}

impl RatingTier {
    /// Declaration order; `from_weight` returns the first match in this order.
    pub const ALL: [RatingTier; 7] = [
        Self::Borked,
        Self::Pending,
        Self::Bronze,
        Self::Silver,
        Self::Gold,
        Self::Platinum,
        Self::Native,
    ];

    pub fn weight(self) -> u8 {
        match self {
            Self::Borked => 0,
            Self::Pending => 1,
            Self::Bronze => 2,
            Self::Silver => 3,
            Self::Gold => 4,
            Self::Platinum => 5,
            Self::Native => 6,
        }
    }

    pub fn from_weight(weight: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.weight() == weight)
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Borked => "red",
            Self::Pending => "blue",
            Self::Bronze => "#CD7F32",
            Self::Silver => "#A6A6A6",
            Self::Gold => "#CFB53B",
            Self::Platinum => "#B4C7DC",
            Self::Native => "#02b302",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borked => "borked",
            Self::Pending => "pending",
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for RatingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| AppError::UpstreamSchema(format!("unknown rating tier '{s}'")))
    }
}

/// Anti-cheat status as reported by AreWeAntiCheatYet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AntiCheatStatus {
    Denied,
    Broken,
    Planned,
    Running,
    Supported,
    #[serde(rename = "")]
    Blank,
}

impl AntiCheatStatus {
    pub const ALL: [AntiCheatStatus; 6] = [
        Self::Denied,
        Self::Broken,
        Self::Planned,
        Self::Running,
        Self::Supported,
        Self::Blank,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Denied => "Denied",
            Self::Broken => "Broken",
            Self::Planned => "Planned",
            Self::Running => "Running",
            Self::Supported => "Supported",
            Self::Blank => "",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Denied => "red",
            Self::Broken => "dark_orange3",
            Self::Planned => "purple",
            Self::Running => "blue",
            Self::Supported => "#02b302",
            Self::Blank => "",
        }
    }
}

impl fmt::Display for AntiCheatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AntiCheatStatus {
    type Err = AppError;

    /// Exact, case-sensitive match. Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::UpstreamSchema(format!("unknown anti-cheat status '{s}'")))
    }
}

/// A game with its resolved rating.
///
/// `cached_at` is `None` until the record has been persisted, or when the
/// stored timestamp could not be parsed. Records returned by a library
/// aggregation are stamped after their batch write.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub app_id: String,
    pub name: String,
    pub rating: RatingTier,
    pub playtime: u64,
    pub cached_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    Linux,
    Mac,
    Windows,
}

impl TargetPlatform {
    /// Key of this platform inside the store's `platforms` object.
    pub fn key(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Windows => "windows",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntiCheatRecord {
    pub app_id: String,
    pub status: AntiCheatStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryResult {
    pub game_ratings: Vec<GameRecord>,
    /// `None` when the library has no games to average.
    pub user_average: Option<RatingTier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryItem {
    pub app_id: String,
    pub name: String,
    pub rating: RatingTier,
    pub rating_color: &'static str,
    pub playtime_min: u64,
    pub anticheat: Option<AntiCheatStatus>,
    pub anticheat_color: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedGameItem {
    pub app_id: String,
    pub name: String,
    pub rating: RatingTier,
    pub playtime_min: u64,
    pub cached_at: Option<String>,
}
