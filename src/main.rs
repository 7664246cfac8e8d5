mod anticheat;
mod cache;
mod cli;
mod config;
mod error;
mod http;
mod library;
mod models;
mod output;
mod protondb;
mod steam;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheStore, FileStorage, format_timestamp};
use crate::cli::{
    CacheSubcommands, Cli, Commands, ConfigSubcommands, LibraryArgs, OutputFormat,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::http::ReqwestClient;
use crate::library::AggregateOptions;
use crate::models::{CachedGameItem, DataSource, LibraryItem, RatingTier};
use crate::output::{build_pagination, format_playtime, print_error, print_success};

#[derive(Debug, Serialize)]
struct LibraryData {
    steamid: String,
    user_average: Option<RatingTier>,
    user_average_color: Option<&'static str>,
    anticheat_available: bool,
    items: Vec<LibraryItem>,
}

#[derive(Debug, Serialize)]
struct CacheClearData {
    path: String,
    removed: bool,
}

#[derive(Debug, Serialize)]
struct CachePruneData {
    path: String,
    games: usize,
    anticheat: usize,
}

#[derive(Debug, Serialize)]
struct CacheShowData {
    items: Vec<CachedGameItem>,
}

#[derive(Debug, Serialize)]
struct ConfigData {
    items: Vec<ConfigItem>,
}

#[derive(Debug, Serialize)]
struct ConfigItem {
    key: &'static str,
    value: Option<String>,
}

struct Paths {
    cache: PathBuf,
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.resolved_format();
    init_logging(cli.verbose);

    let result = run(cli, format).await;
    if let Err(err) = result {
        print_error(format, err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, format: OutputFormat) -> Result<(), AppError> {
    let paths = Paths {
        cache: match cli.cache_path {
            Some(path) => path,
            None => config::default_cache_path()?,
        },
        config: match cli.config_path {
            Some(path) => path,
            None => config::default_config_path()?,
        },
    };

    match cli.command {
        Commands::Library(args) => handle_library(format, &paths, args).await,
        Commands::Cache(cmd) => handle_cache(format, &paths, cmd.action),
        Commands::Config(cmd) => handle_config(format, &paths, cmd.action),
    }
}

async fn handle_library(
    format: OutputFormat,
    paths: &Paths,
    args: LibraryArgs,
) -> Result<(), AppError> {
    let mut settings = Settings::load(&paths.config)?;
    let api_key = resolve_api_key(args.api_key.as_deref(), &settings)?;

    let user = match args.user.as_deref().map(steam::normalize_user_input) {
        Some(user) if !user.is_empty() => user,
        Some(_) => {
            return Err(AppError::InvalidArgument(
                "user must not be empty".to_string(),
            ));
        }
        None => match (&settings.user_id, settings.preserve_user_id) {
            (Some(saved), true) => saved.clone(),
            _ => {
                return Err(AppError::InvalidArgument(
                    "provide a steam id, vanity name, or profile URL".to_string(),
                ));
            }
        },
    };

    let http = ReqwestClient::new(Duration::from_secs(args.timeout_sec.max(1)))?;
    let steamid = steam::resolve_steam_id(&http, &api_key, &user).await?;

    let mut cache = CacheStore::new(FileStorage::new(&paths.cache));
    cache.load(true)?;

    let payload = steam::fetch_owned_games(&http, &api_key, &steamid).await?;
    let options = AggregateOptions {
        concurrency: args.concurrency,
        platform: args.platform.into(),
    };
    let result = library::aggregate(&http, &mut cache, &payload, options).await?;

    let snapshot = anticheat::refresh(&http, &mut cache).await?;
    let items = result
        .game_ratings
        .iter()
        .map(|game| {
            let anticheat = snapshot
                .and_then(|c| c.get_anticheat(&game.app_id))
                .map(|record| record.status);
            LibraryItem {
                app_id: game.app_id.clone(),
                name: game.name.clone(),
                rating: game.rating,
                rating_color: game.rating.color(),
                playtime_min: game.playtime,
                anticheat,
                anticheat_color: anticheat.map(|status| status.color()),
            }
        })
        .collect::<Vec<_>>();

    if settings.preserve_user_id {
        settings.user_id = Some(user);
        settings.save(&paths.config)?;
    }

    let total = items.len();
    let offset = args.offset.min(total);
    let limit = args.limit.unwrap_or(total).max(1);
    let paged = items
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect::<Vec<_>>();
    let pagination = build_pagination(limit, offset, paged.len(), Some(total));

    info!(steamid = %steamid, games = total, "library rated");

    let data = LibraryData {
        steamid,
        user_average: result.user_average,
        user_average_color: result.user_average.map(RatingTier::color),
        anticheat_available: snapshot.is_some(),
        items: paged,
    };

    print_success(
        format,
        data,
        Some(pagination),
        DataSource::SteamWebapi,
        false,
        print_library_human,
    );
    Ok(())
}

fn resolve_api_key(flag: Option<&str>, settings: &Settings) -> Result<String, AppError> {
    let from_env = std::env::var("STEAM_API_KEY").ok();
    [flag.map(str::to_string), from_env, settings.steam_api_key.clone()]
        .into_iter()
        .flatten()
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(
                "a Steam API key is required (--api-key, STEAM_API_KEY, or `config set steam-api-key`)"
                    .to_string(),
            )
        })
}

fn handle_cache(
    format: OutputFormat,
    paths: &Paths,
    action: CacheSubcommands,
) -> Result<(), AppError> {
    let storage = FileStorage::new(&paths.cache);

    match action {
        CacheSubcommands::Clear => {
            let removed = storage.clear()?;
            let data = CacheClearData {
                path: storage.path().display().to_string(),
                removed,
            };
            print_success(format, data, None, DataSource::LocalCache, true, |d| {
                if d.removed {
                    println!("removed {}", d.path);
                } else {
                    println!("no cache at {}", d.path);
                }
            });
        }
        CacheSubcommands::Prune => {
            let mut cache = CacheStore::new(storage);
            cache.load(true)?;
            let data = CachePruneData {
                path: cache.storage().path().display().to_string(),
                games: cache.game_count(),
                anticheat: cache.anticheat_count(),
            };
            print_success(format, data, None, DataSource::LocalCache, true, |d| {
                println!(
                    "{}: {} game ratings, {} anti-cheat entries kept",
                    d.path, d.games, d.anticheat
                );
            });
        }
        CacheSubcommands::Show => {
            let mut cache = CacheStore::new(storage);
            cache.load(true)?;
            let items = cache
                .games()
                .map(|game| CachedGameItem {
                    cached_at: game.cached_at.map(format_timestamp),
                    app_id: game.app_id,
                    name: game.name,
                    rating: game.rating,
                    playtime_min: game.playtime,
                })
                .collect::<Vec<_>>();
            let empty = !cache.has_game_cache();
            let data = CacheShowData { items };
            print_success(format, data, None, DataSource::LocalCache, true, |d| {
                if empty {
                    println!("cache is empty");
                    return;
                }
                println!("cached ratings ({})", d.items.len());
                for item in &d.items {
                    println!(
                        "{}\t{}\t{}\t{}",
                        item.app_id,
                        item.name,
                        item.rating,
                        item.cached_at.as_deref().unwrap_or("?")
                    );
                }
            });
        }
    }
    Ok(())
}

fn handle_config(
    format: OutputFormat,
    paths: &Paths,
    action: ConfigSubcommands,
) -> Result<(), AppError> {
    let mut settings = Settings::load(&paths.config)?;

    let keys: Vec<&'static str> = match action {
        ConfigSubcommands::Get(args) => {
            let key = config::KNOWN_KEYS
                .into_iter()
                .find(|k| *k == args.key)
                .ok_or_else(|| {
                    AppError::InvalidArgument(format!("unknown config key '{}'", args.key))
                })?;
            vec![key]
        }
        ConfigSubcommands::Set(args) => {
            settings.set(&args.key, &args.value)?;
            settings.save(&paths.config)?;
            let key = config::KNOWN_KEYS
                .into_iter()
                .find(|k| *k == args.key)
                .ok_or_else(|| AppError::Internal("config key vanished".to_string()))?;
            vec![key]
        }
        ConfigSubcommands::List => config::KNOWN_KEYS.to_vec(),
    };

    let items = keys
        .into_iter()
        .map(|key| -> Result<ConfigItem, AppError> {
            let value = settings.get(key)?;
            let value = if key == config::KEY_API_KEY {
                value.map(|v| mask_secret(&v))
            } else {
                value
            };
            Ok(ConfigItem { key, value })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    print_success(
        format,
        ConfigData { items },
        None,
        DataSource::LocalConfig,
        false,
        |d| {
            for item in &d.items {
                println!("{} = {}", item.key, item.value.as_deref().unwrap_or(""));
            }
        },
    );
    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let visible = secret.chars().rev().take(4).collect::<Vec<_>>();
    let tail = visible.into_iter().rev().collect::<String>();
    format!("****{tail}")
}

fn print_library_human(data: &LibraryData) {
    println!("library for {} ({} shown)", data.steamid, data.items.len());
    println!(
        "average rating: {}",
        data.user_average
            .map(|tier| tier.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    if !data.anticheat_available {
        println!("anti-cheat data unavailable");
    }
    for item in &data.items {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            item.app_id,
            item.name,
            item.rating,
            format_playtime(item.playtime_min),
            item.anticheat
                .map(|status| status.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_prefers_flag_over_settings() {
        let settings = Settings {
            steam_api_key: Some("SAVED".to_string()),
            ..Settings::default()
        };
        assert_eq!(resolve_api_key(Some(" FLAG "), &settings).unwrap(), "FLAG");
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("ABCDEFGH1234"), "****1234");
        assert_eq!(mask_secret("ab"), "****ab");
    }
}
