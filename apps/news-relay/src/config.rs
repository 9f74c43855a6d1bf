use crate::error::ConfigError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_POST_TIMES: &str = "09:00,12:00,18:00";
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
pub const DEFAULT_FEED_URLS: [&str; 3] = [
    "https://hnrss.org/frontpage?points=100",
    "https://hnrss.org/best?points=200",
    "https://hnrss.org/newest?points=150",
];
pub const DEFAULT_HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// RSS/Atom feeds, merged.
    Feed(Vec<String>),
    /// Hacker News item API rooted at the given base URL.
    HackerNews(String),
}

/// Service configuration, read from the environment.
#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_channel_id: String,
    pub telegram_api_base: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,

    pub post_times: Vec<NaiveTime>,
    pub timezone: Tz,
    pub post_quota: usize,
    pub fetch_count: usize,
    pub seen_capacity: usize,
    pub seen_store_path: PathBuf,

    pub target_language: String,
    pub translate_body: bool,
    pub source: SourceKind,

    pub http_timeout: Duration,
    pub candidate_timeout: Duration,
    pub channel_signature: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_channel_id", &self.telegram_channel_id)
            .field("gemini_model", &self.gemini_model)
            .field("post_times", &self.post_times)
            .field("timezone", &self.timezone)
            .field("post_quota", &self.post_quota)
            .field("fetch_count", &self.fetch_count)
            .field("seen_capacity", &self.seen_capacity)
            .field("seen_store_path", &self.seen_store_path)
            .field("target_language", &self.target_language)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let required = ["TELEGRAM_BOT_TOKEN", "TELEGRAM_CHANNEL_ID", "GEMINI_API_KEY"];
        let missing: Vec<&'static str> = required.into_iter().filter(|key| get(*key).is_none()).collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(vec![key]));

        let post_times = parse_post_times(&get("POST_TIMES").unwrap_or_else(|| DEFAULT_POST_TIMES.to_string()))?;
        let timezone = get("TIMEZONE")
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid {
                var: "TIMEZONE",
                reason: e.to_string(),
            })?;

        let source = match get("NEWS_SOURCE").as_deref().unwrap_or("feed") {
            "feed" | "rss" => {
                let urls = get("FEED_URLS")
                    .map(|v| split_list(&v))
                    .unwrap_or_else(|| DEFAULT_FEED_URLS.iter().map(|s| s.to_string()).collect());
                if urls.is_empty() {
                    return Err(ConfigError::Invalid {
                        var: "FEED_URLS",
                        reason: "no feed URLs given".to_string(),
                    });
                }
                SourceKind::Feed(urls)
            }
            "hackernews" | "hn" => {
                SourceKind::HackerNews(get("HN_API_BASE").unwrap_or_else(|| DEFAULT_HN_API_BASE.to_string()))
            }
            other => {
                return Err(ConfigError::Invalid {
                    var: "NEWS_SOURCE",
                    reason: format!("unknown source type '{}', expected 'feed' or 'hackernews'", other),
                })
            }
        };

        Ok(Self {
            telegram_bot_token: require("TELEGRAM_BOT_TOKEN")?,
            telegram_channel_id: require("TELEGRAM_CHANNEL_ID")?,
            telegram_api_base: get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            gemini_api_key: require("GEMINI_API_KEY")?,
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| gemini_engine::DEFAULT_BASE_URL.to_string()),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| gemini_engine::DEFAULT_MODEL.to_string()),
            post_times,
            timezone,
            post_quota: parse_positive(get("POST_QUOTA"), "POST_QUOTA", 1)?,
            fetch_count: parse_positive(get("FETCH_COUNT"), "FETCH_COUNT", 10)?,
            seen_capacity: parse_positive(get("SEEN_CAPACITY"), "SEEN_CAPACITY", 30)?,
            seen_store_path: get("SEEN_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/seen.json")),
            target_language: get("TARGET_LANGUAGE").unwrap_or_else(|| "Russian".to_string()),
            translate_body: parse_bool(get("TRANSLATE_BODY"), "TRANSLATE_BODY", true)?,
            source,
            http_timeout: Duration::from_secs(parse_positive(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 30)? as u64),
            candidate_timeout: Duration::from_secs(
                parse_positive(get("CANDIDATE_TIMEOUT_SECS"), "CANDIDATE_TIMEOUT_SECS", 120)? as u64,
            ),
            channel_signature: get("CHANNEL_SIGNATURE"),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `HH:MM[,HH:MM...]`.
pub fn parse_post_times(value: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    let times = split_list(value)
        .iter()
        .map(|s| {
            NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| ConfigError::Invalid {
                var: "POST_TIMES",
                reason: format!("'{}': {}", s, e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if times.is_empty() {
        return Err(ConfigError::Invalid {
            var: "POST_TIMES",
            reason: "no post times given".to_string(),
        });
    }
    Ok(times)
}

fn parse_positive(value: Option<String>, var: &'static str, default: usize) -> Result<usize, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match usize::from_str(&raw) {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            var,
            reason: "must be at least 1".to_string(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: format!("'{}': {}", raw, e),
        }),
    }
}

fn parse_bool(value: Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("'{}' is not a boolean", raw),
        }),
    }
}
