use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-defined story identity. Integer ids are carried in their decimal form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    pub fn new(id: impl Into<String>) -> Self {
        StoryId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for StoryId {
    fn from(id: u64) -> Self {
        StoryId(id.to_string())
    }
}

impl From<&str> for StoryId {
    fn from(id: &str) -> Self {
        StoryId(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    pub url: String,
    /// Points / score when the source reports one.
    pub score: Option<i64>,
}

impl Story {
    pub fn new(id: impl Into<StoryId>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = Some(score);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub story_id: StoryId,
    pub plain_text: String,
}

impl ExtractedArticle {
    /// Leading whole paragraphs up to `max_chars`. A first paragraph longer than
    /// the budget is cut on a character boundary and marked with an ellipsis.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut out = String::new();
        let mut used = 0;

        for para in paragraphs(&self.plain_text) {
            let len = para.chars().count();
            let sep = if out.is_empty() { 0 } else { 2 };

            if used + sep + len <= max_chars {
                if sep > 0 {
                    out.push_str("\n\n");
                }
                out.push_str(para);
                used += sep + len;
            } else {
                if out.is_empty() {
                    out = truncate_chars(para, max_chars);
                }
                break;
            }
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedPost {
    pub title: String,
    pub body: Option<String>,
    pub link: String,
    pub score: Option<i64>,
}

/// Non-empty paragraphs separated by blank lines, trimmed.
pub fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

/// Cut `text` to at most `max_chars` characters, ending with `…` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}
