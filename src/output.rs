use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::AppError;
use crate::models::{DataSource, Envelope, ErrorBody, Meta, Pagination};

const PRIVATE_ACCOUNT_HELP: &str = "\
Your Steam profile's game details are private.

Change your Steam profile privacy settings:
1. From Steam, open the user menu and select \"View my profile\"
2. Click \"Edit Profile\"
3. Open the \"Privacy Settings\" tab
4. Set \"Game details\" to Public
5. Uncheck \"Always keep my total playtime private\"";

pub fn build_pagination(
    limit: usize,
    offset: usize,
    returned: usize,
    total: Option<usize>,
) -> Pagination {
    let has_more = match total {
        Some(t) => offset.saturating_add(returned) < t,
        None => returned == limit,
    };
    Pagination {
        limit,
        offset,
        returned,
        has_more,
        total,
    }
}

pub fn print_success<T: Serialize>(
    format: OutputFormat,
    data: T,
    pagination: Option<Pagination>,
    source: DataSource,
    cached: bool,
    human: impl FnOnce(&T),
) {
    match format {
        OutputFormat::Human => human(&data),
        OutputFormat::Json => {
            let envelope = Envelope {
                ok: true,
                data: Some(data),
                pagination,
                meta: meta(source, cached),
                error: None,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }
}

pub fn print_error(format: OutputFormat, error: AppError) {
    match format {
        OutputFormat::Human => {
            eprintln!("Error [{}]: {}", error.code(), error);
            if matches!(error, AppError::PrivateAccount(_)) {
                eprintln!("\n{PRIVATE_ACCOUNT_HELP}");
            }
        }
        OutputFormat::Json => {
            let envelope: Envelope<serde_json::Value> = Envelope {
                ok: false,
                data: None,
                pagination: None,
                meta: meta(DataSource::Internal, false),
                error: Some(ErrorBody {
                    code: error.code(),
                    message: error.to_string(),
                }),
            };
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| "{}".to_string())
            );
        }
    }
}

fn meta(source: DataSource, cached: bool) -> Meta {
    Meta {
        version: env!("CARGO_PKG_VERSION"),
        source,
        cached,
    }
}

/// `12933` minutes renders as `215h 33m`.
pub fn format_playtime(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
