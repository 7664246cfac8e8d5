use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::models::TargetPlatform;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlatformArg {
    Linux,
    Mac,
    Windows,
}

impl From<PlatformArg> for TargetPlatform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Linux => Self::Linux,
            PlatformArg::Mac => Self::Mac,
            PlatformArg::Windows => Self::Windows,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "deckcheck",
    version,
    about = "Check the ProtonDB compatibility of every game in a Steam library"
)]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = OutputFormatArg::Human)]
    pub format: OutputFormatArg,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub json: bool,
    /// Log debug output to stderr
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    /// Cache file location
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,
    /// Settings file location
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rate a user's library
    Library(LibraryArgs),
    Cache(CacheCommand),
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct LibraryArgs {
    /// Steam id, vanity name, or steamcommunity.com profile URL
    pub user: Option<String>,
    /// Steam Web API key (falls back to STEAM_API_KEY, then the saved setting)
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long, value_enum, default_value_t = PlatformArg::Linux)]
    pub platform: PlatformArg,
    /// Rating lookups in flight at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_sec: u64,
    #[arg(long)]
    pub limit: Option<usize>,
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(Debug, Subcommand)]
pub enum CacheSubcommands {
    /// Delete the cache file
    Clear,
    /// Drop expired entries
    Prune,
    /// List cached game ratings
    Show,
}

#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommands {
    Get(ConfigGetArgs),
    Set(ConfigSetArgs),
    List,
}

#[derive(Debug, Args)]
pub struct ConfigGetArgs {
    pub key: String,
}

#[derive(Debug, Args)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigSubcommands,
}

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

impl Cli {
    pub fn resolved_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            match self.format {
                OutputFormatArg::Human => OutputFormat::Human,
                OutputFormatArg::Json => OutputFormat::Json,
            }
        }
    }
}
