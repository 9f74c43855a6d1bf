use crate::error::RelayError;
use crate::models::{ExtractedArticle, Story};
use async_trait::async_trait;
use gemini_engine::extract_domain;
use readability::extractor;
use std::io::Cursor;
use tracing::{debug, instrument};

/// Upper bound on the text kept from a single page.
const MAX_ARTICLE_CHARS: usize = 50_000;

#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, story: &Story) -> Result<ExtractedArticle, RelayError>;
}

/// Downloads the page and runs readability over it to drop navigation, ads
/// and comment blocks.
pub struct ReadabilityExtractor {
    client: reqwest::Client,
}

impl ReadabilityExtractor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArticleExtractor for ReadabilityExtractor {
    #[instrument(skip(self, story), fields(story_id = %story.id, url_domain = %extract_domain(&story.url)))]
    async fn extract(&self, story: &Story) -> Result<ExtractedArticle, RelayError> {
        let url = story.url.as_str();
        let parsed_url = url::Url::parse(url)
            .map_err(|e| RelayError::not_extractable(url, format!("URL parse error: {}", e)))?;

        let response = self
            .client
            .get(parsed_url.clone())
            .send()
            .await
            .map_err(|e| RelayError::not_extractable(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::not_extractable(url, format!("HTTP {}", status)));
        }

        let html_content = response
            .text()
            .await
            .map_err(|e| RelayError::not_extractable(url, e.to_string()))?;
        if html_content.trim().is_empty() {
            return Err(RelayError::not_extractable(url, "empty body"));
        }

        let plain_text = extract_text(&html_content, &parsed_url)?;
        debug!(char_count = plain_text.chars().count(), "Article text extracted");

        Ok(ExtractedArticle {
            story_id: story.id.clone(),
            plain_text,
        })
    }
}

/// Readability pass over `html`, normalised to blank-line separated paragraphs.
pub fn extract_text(html: &str, url: &url::Url) -> Result<String, RelayError> {
    let mut reader = Cursor::new(html.as_bytes());
    let product = extractor::extract(&mut reader, url)
        .map_err(|e| RelayError::not_extractable(url.as_str(), format!("Readability extract error: {:?}", e)))?;

    let text = normalize_paragraphs(&product.text);
    if text.is_empty() {
        return Err(RelayError::not_extractable(url.as_str(), "no readable text"));
    }

    // Truncate safely at character boundary to avoid UTF-8 split
    Ok(text.chars().take(MAX_ARTICLE_CHARS).collect())
}

/// Collapse runs of whitespace inside lines and keep one blank line between
/// paragraphs.
pub fn normalize_paragraphs(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_paragraphs() {
        let raw = "  First   line \n\n\n\t\nSecond\tline  \n   ";
        assert_eq!(normalize_paragraphs(raw), "First line\n\nSecond line");
    }

    #[test]
    fn test_blank_text_normalizes_to_empty() {
        assert_eq!(normalize_paragraphs(" \n \t \n"), "");
    }
}
