use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

// --- Shared Utilities ---

/// Extract the domain/host from a URL string safely.
/// Returns "unknown" if the URL cannot be parsed.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

// --- Shared Logging ---

/// Initialize structured logging with JSON format in production (when RUST_LOG is set),
/// or pretty format for local development.
pub fn init_logging() {
    let is_production = std::env::var("RUST_LOG").is_ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if is_production {
        let _ = fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Gemini request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Gemini API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Gemini API Error: {0}")]
    Api(String),

    #[error("No content returned from Gemini")]
    Empty,
}

// --- Gemini Structs ---
#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiPart {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

impl GeminiRequest {
    pub fn from_prompt(text: String) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text }],
            }],
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[derive(Deserialize, Debug)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiApiError>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiApiError {
    pub message: String,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate, or the API error it carries.
    pub fn into_text(self) -> Result<String, EngineError> {
        if let Some(error) = self.error {
            return Err(EngineError::Api(error.message));
        }

        self.candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|first| first.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(EngineError::Empty)
    }
}

// --- Client ---

/// Thin `generateContent` client. The HTTP client carries the request timeout.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_url(&self) -> Result<Url, EngineError> {
        let mut url = Url::parse(&self.endpoint())
            .map_err(|e| EngineError::Api(format!("invalid Gemini endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: String) -> Result<String, EngineError> {
        debug!("Sending request to Gemini API");

        // Note: API key in query string is required by Gemini API - errors are stripped of the URL
        let res = self
            .http
            .post(self.request_url()?)
            .json(&GeminiRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| EngineError::Http(e.without_url()))?;

        let status = res.status();
        debug!(status = %status, "Gemini API response received");

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(EngineError::Status { status: status.as_u16(), body });
        }

        let resp: GeminiResponse = res.json().await.map_err(|e| EngineError::Http(e.without_url()))?;
        resp.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://news.ycombinator.com/item?id=1"), "news.ycombinator.com");
        assert_eq!(extract_domain("not a url"), "unknown");
    }

    #[test]
    fn test_gemini_request_serialization() {
        let request = GeminiRequest::from_prompt("Hello, Gemini!".to_string());

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Hello, Gemini!"));
        assert!(json.contains("contents"));
        assert!(json.contains("parts"));
        assert!(json.contains("text"));
    }

    #[test]
    fn test_gemini_response_deserialization_success() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "Hello from Gemini!"}]
                }
            }]
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_text().unwrap(), "Hello from Gemini!");
    }

    #[test]
    fn test_gemini_response_deserialization_error() {
        let json = r#"{
            "error": {
                "message": "API key invalid"
            }
        }"#;

        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        match response.into_text() {
            Err(EngineError::Api(message)) => assert_eq!(message, "API key invalid"),
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_gemini_response_deserialization_empty() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(response.into_text(), Err(EngineError::Empty)));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(reqwest::Client::new(), "k", "http://localhost:9/", "gemini-pro");
        assert_eq!(client.endpoint(), "http://localhost:9/v1beta/models/gemini-pro:generateContent");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = GeminiClient::new(reqwest::Client::new(), "secret-key", DEFAULT_BASE_URL, DEFAULT_MODEL);
        assert!(!format!("{:?}", client).contains("secret-key"));
    }
}
