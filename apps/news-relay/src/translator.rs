use crate::error::RelayError;
use crate::models::paragraphs;
use async_trait::async_trait;
use gemini_engine::{EngineError, GeminiClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Largest piece of text sent to the backend in one request.
pub const MAX_CHUNK_CHARS: usize = 4_000;

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_chunk(&self, text: &str, target_language: &str) -> Result<String, EngineError>;
}

/// Gemini-backed translation using a plain instruction prompt.
pub struct GeminiTranslator {
    client: GeminiClient,
}

impl GeminiTranslator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

fn translation_prompt(text: &str, target_language: &str) -> String {
    format!(
        "Translate the following technical text into {}. Keep technical terms and product names recognisable, but make the text natural for a native reader. Reply ONLY with the translation, without comments or quotes.\n\n{}",
        target_language, text
    )
}

#[async_trait]
impl TranslationBackend for GeminiTranslator {
    async fn translate_chunk(&self, text: &str, target_language: &str) -> Result<String, EngineError> {
        let translated = self.client.generate(translation_prompt(text, target_language)).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(EngineError::Empty);
        }
        Ok(translated.to_string())
    }
}

/// Result of a translation that never fails: `degraded` is set when the
/// original text was returned instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub degraded: bool,
}

/// Chunking, timeouts and fallback around a [`TranslationBackend`].
#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    call_timeout: Duration,
}

impl Translator {
    pub fn new(backend: Arc<dyn TranslationBackend>, call_timeout: Duration) -> Self {
        Self { backend, call_timeout }
    }

    /// Translate `text`, falling back to the original on any backend failure.
    pub async fn translate(&self, text: &str, target_language: &str) -> Translation {
        self.translate_until(text, target_language, None).await
    }

    /// Like [`Translator::translate`], but every backend call is also cut off
    /// at `deadline`. Running out of time yields the original text.
    pub async fn translate_before(&self, text: &str, target_language: &str, deadline: Instant) -> Translation {
        self.translate_until(text, target_language, Some(deadline)).await
    }

    async fn translate_until(&self, text: &str, target_language: &str, deadline: Option<Instant>) -> Translation {
        if text.trim().is_empty() {
            return Translation { text: text.to_string(), degraded: false };
        }

        match self.translate_chunks(text, target_language, deadline).await {
            Ok(translated) => Translation { text: translated, degraded: false },
            Err(e) => {
                warn!(error = %e, text_len = text.len(), "Translation failed, keeping original text");
                Translation { text: text.to_string(), degraded: true }
            }
        }
    }

    async fn translate_chunks(
        &self,
        text: &str,
        target_language: &str,
        deadline: Option<Instant>,
    ) -> Result<String, RelayError> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        debug!(chunks = chunks.len(), "Translating text");

        let mut translated = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let limit = match deadline {
                Some(deadline) => self.call_timeout.min(deadline.saturating_duration_since(Instant::now())),
                None => self.call_timeout,
            };
            let call = self.backend.translate_chunk(chunk, target_language);
            let piece = tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RelayError::TranslationDegraded(format!("backend timed out after {:?}", limit)))?
                .map_err(|e| RelayError::TranslationDegraded(e.to_string()))?;
            translated.push(piece);
        }

        Ok(translated.join("\n\n"))
    }
}

/// Group paragraphs into chunks of at most `max_chars` characters, preserving
/// order. Paragraphs longer than the limit are split on character boundaries.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for para in paragraphs(text) {
        let para_len = para.chars().count();

        if para_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = para.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let sep = if current.is_empty() { 0 } else { 2 };
        if current_len + sep + para_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(para);
        current_len += para_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
