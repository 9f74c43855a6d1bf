use crate::error::RelayError;
use crate::models::{Story, StoryId};
use async_trait::async_trait;
use atom_syndication::Feed;
use futures::stream::{self, StreamExt};
use rss::Channel;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Item documents requested concurrently; results keep ranking order.
const ITEM_FANOUT: usize = 4;

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Up to `max_count` stories, highest-ranked first. Malformed entries are
    /// skipped; `SourceUnavailable` means nothing could be read at all.
    async fn fetch_candidates(&self, max_count: usize) -> Result<Vec<Story>, RelayError>;
}

// --- RSS / Atom feeds ---

/// Merges one or more RSS/Atom feeds (e.g. hnrss.org), de-duplicated by link
/// and ordered by points.
pub struct FeedSource {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl FeedSource {
    pub fn new(client: reqwest::Client, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    #[instrument(skip(self), fields(url_domain = %gemini_engine::extract_domain(url)))]
    async fn fetch_feed(&self, url: &str) -> Result<Vec<Story>, RelayError> {
        let unavailable = |e: String| RelayError::SourceUnavailable(format!("{}: {}", url, e));

        let response = self.client.get(url).send().await.map_err(|e| unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status)));
        }
        let content = response.bytes().await.map_err(|e| unavailable(e.to_string()))?;

        parse_feed(&content).map_err(unavailable)
    }
}

#[async_trait]
impl NewsSource for FeedSource {
    async fn fetch_candidates(&self, max_count: usize) -> Result<Vec<Story>, RelayError> {
        let mut all_stories = Vec::new();
        let mut failures = 0;

        for url in &self.urls {
            match self.fetch_feed(url).await {
                Ok(mut stories) => {
                    debug!(url = %url, count = stories.len(), "Fetched feed");
                    all_stories.append(&mut stories);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch feed");
                    failures += 1;
                }
            }
        }

        if failures == self.urls.len() {
            return Err(RelayError::SourceUnavailable(format!(
                "all {} feeds failed",
                self.urls.len()
            )));
        }

        let stories = rank_unique(all_stories, max_count);
        info!(count = stories.len(), "Collected feed candidates");
        Ok(stories)
    }
}

/// Drop repeated links (first occurrence wins), order by score descending with
/// unscored entries last, and keep the first `max_count`.
pub fn rank_unique(stories: Vec<Story>, max_count: usize) -> Vec<Story> {
    let mut seen_links = HashSet::new();
    let mut unique: Vec<Story> = stories
        .into_iter()
        .filter(|s| seen_links.insert(s.url.clone()))
        .collect();

    // Stable: feed order breaks ties
    unique.sort_by_key(|s| std::cmp::Reverse(s.score));
    unique.truncate(max_count);
    unique
}

/// Parse an RSS 2.0 document, falling back to Atom.
pub fn parse_feed(content: &[u8]) -> Result<Vec<Story>, String> {
    match Channel::read_from(content) {
        Ok(channel) => Ok(stories_from_rss(&channel)),
        Err(rss_err) => match Feed::read_from(content) {
            Ok(feed) => Ok(stories_from_atom(&feed)),
            Err(atom_err) => Err(format!("not RSS ({}) nor Atom ({})", rss_err, atom_err)),
        },
    }
}

fn stories_from_rss(channel: &Channel) -> Vec<Story> {
    let mut stories = Vec::new();
    let mut skipped = 0;

    for item in channel.items() {
        let (Some(title), Some(link)) = (item.title(), item.link()) else {
            skipped += 1;
            continue;
        };
        let (title, link) = (title.trim(), link.trim());
        if title.is_empty() || link.is_empty() {
            skipped += 1;
            continue;
        }

        let id = item
            .guid()
            .map(|g| g.value().trim())
            .filter(|g| !g.is_empty())
            .unwrap_or(link);

        stories.push(Story {
            id: StoryId::new(id),
            title: title.to_string(),
            url: link.to_string(),
            score: item.description().and_then(parse_points),
        });
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed RSS entries");
    }
    stories
}

fn stories_from_atom(feed: &Feed) -> Vec<Story> {
    let mut stories = Vec::new();
    let mut skipped = 0;

    for entry in feed.entries() {
        let title = entry.title().value.trim();
        let link = entry
            .links()
            .iter()
            .find(|l| l.rel() == "alternate")
            .or_else(|| entry.links().first())
            .map(|l| l.href().trim())
            .unwrap_or_default();

        if title.is_empty() || link.is_empty() {
            skipped += 1;
            continue;
        }

        let id = Some(entry.id().trim()).filter(|id| !id.is_empty()).unwrap_or(link);
        let score = entry
            .summary()
            .map(|s| s.value.as_str())
            .or_else(|| entry.content().and_then(|c| c.value()))
            .and_then(parse_points);

        stories.push(Story {
            id: StoryId::new(id),
            title: title.to_string(),
            url: link.to_string(),
            score,
        });
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed Atom entries");
    }
    stories
}

/// hnrss.org descriptions carry `Points: 123`.
pub fn parse_points(description: &str) -> Option<i64> {
    let start = description.find("Points:")? + "Points:".len();
    description[start..]
        .chars()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()
}

// --- Hacker News item API ---

#[derive(Deserialize, Debug)]
struct HnItem {
    id: u64,
    title: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    r#type: Option<String>,
    #[serde(default)]
    dead: bool,
    #[serde(default)]
    deleted: bool,
}

/// `topstories.json` followed by one item document per id.
pub struct HackerNewsSource {
    client: reqwest::Client,
    api_base: String,
}

impl HackerNewsSource {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_item(&self, id: u64) -> Result<Option<Story>, RelayError> {
        let unavailable = |reason: String| RelayError::ItemUnavailable {
            id: id.to_string(),
            reason,
        };

        let url = format!("{}/item/{}.json", self.api_base, id);
        let resp = self.client.get(&url).send().await.map_err(|e| unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(unavailable(format!("HTTP {}", resp.status())));
        }
        // The API answers `null` for unknown ids
        let item: Option<HnItem> = resp.json().await.map_err(|e| unavailable(e.to_string()))?;
        let Some(item) = item else {
            return Err(unavailable("no such item".to_string()));
        };

        if item.dead || item.deleted || item.r#type.as_deref().is_some_and(|t| t != "story") {
            debug!(id = item.id, "Skipping non-story item");
            return Ok(None);
        }

        match (item.title, item.url) {
            (Some(title), Some(url)) if !title.trim().is_empty() && !url.trim().is_empty() => Ok(Some(Story {
                id: StoryId::from(item.id),
                title: title.trim().to_string(),
                url: url.trim().to_string(),
                score: item.score,
            })),
            _ => {
                debug!(id = item.id, "Skipping item without title or url");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl NewsSource for HackerNewsSource {
    #[instrument(skip(self), fields(api = %gemini_engine::extract_domain(&self.api_base)))]
    async fn fetch_candidates(&self, max_count: usize) -> Result<Vec<Story>, RelayError> {
        let url = format!("{}/topstories.json", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::SourceUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RelayError::SourceUnavailable(format!("HTTP {}", response.status())));
        }
        let top_ids: Vec<u64> = response
            .json()
            .await
            .map_err(|e| RelayError::SourceUnavailable(e.to_string()))?;

        let results: Vec<_> = stream::iter(top_ids.into_iter().take(max_count))
            .map(|id| self.fetch_item(id))
            .buffered(ITEM_FANOUT)
            .collect()
            .await;

        let mut stories = Vec::new();
        for result in results {
            match result {
                Ok(Some(story)) => stories.push(story),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to fetch HN item"),
            }
        }

        info!(count = stories.len(), "Collected HackerNews candidates");
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Hacker News: Front Page</title><link>https://news.ycombinator.com/</link><description>hnrss</description>
<item><title>Low</title><link>https://a.example/low</link><guid isPermaLink="false">https://news.ycombinator.com/item?id=1</guid><description><![CDATA[<p>Points: 120</p>]]></description></item>
<item><title>High</title><link>https://a.example/high</link><guid isPermaLink="false">https://news.ycombinator.com/item?id=2</guid><description><![CDATA[<p>Points: 450</p>]]></description></item>
<item><link>https://a.example/untitled</link></item>
<item><title>No guid</title><link>https://a.example/noguid</link></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>HN</title><id>urn:feed</id><updated>2024-01-01T00:00:00Z</updated>
<entry><title>Atom story</title><id>urn:story:9</id><updated>2024-01-01T00:00:00Z</updated><link rel="alternate" href="https://b.example/story"/><summary>Points: 77</summary></entry>
<entry><title>No link</title><id>urn:story:10</id><updated>2024-01-01T00:00:00Z</updated></entry>
</feed>"#;

    #[test]
    fn test_parse_points() {
        assert_eq!(parse_points("<p>Article URL: x</p><p>Points: 312</p>"), Some(312));
        assert_eq!(parse_points("Points:7"), Some(7));
        assert_eq!(parse_points("no points here"), None);
        assert_eq!(parse_points("Points: n/a"), None);
    }

    #[test]
    fn test_parse_rss_skips_malformed_entries() {
        let stories = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(stories.len(), 3);
        assert_eq!(stories[0].id.as_str(), "https://news.ycombinator.com/item?id=1");
        assert_eq!(stories[0].score, Some(120));
        // Falls back to the link when there is no guid
        assert_eq!(stories[2].id.as_str(), "https://a.example/noguid");
        assert_eq!(stories[2].score, None);
    }

    #[test]
    fn test_parse_atom_fallback() {
        let stories = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id.as_str(), "urn:story:9");
        assert_eq!(stories[0].url, "https://b.example/story");
        assert_eq!(stories[0].score, Some(77));
    }

    #[test]
    fn test_parse_garbage_is_an_error() {
        assert!(parse_feed(b"{\"not\": \"xml\"}").is_err());
    }

    #[test]
    fn test_rank_unique_orders_by_score_and_dedupes() {
        let stories = vec![
            Story::new("1", "a", "https://x/a").with_score(10),
            Story::new("2", "b", "https://x/b"),
            Story::new("3", "c", "https://x/c").with_score(50),
            Story::new("4", "a-again", "https://x/a").with_score(99),
            Story::new("5", "d", "https://x/d").with_score(10),
        ];
        let ranked = rank_unique(stories, 3);
        let ids: Vec<_> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "5"]);
    }
}
