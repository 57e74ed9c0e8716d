// Translation collaborator
//
// The core treats the text-generation service as an opaque function behind
// the `Translator` trait:
// - gemini: Google Gemini backend (default)
// - ollama: local Ollama backend
// - retrying: decorator applying bounded backoff to every call
// - prompts: prompt templates shared by the backends

pub mod gemini;
pub mod ollama;
pub mod prompts;
pub mod retrying;

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use prompts::PromptBuilder;
pub use retrying::RetryingTranslator;

use crate::config::{LayoutConfig, Provider, TranslateConfig};
use crate::context::{ContextKind, MovieContext, SongContext, TranslationContext};
use crate::error::{LegendaError, Result};
use crate::retry::RetryPolicy;

const MAX_SEARCH_RESULTS: usize = 5;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*\n?").unwrap());

/// A web page the backend used to ground a context search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<TranslationContext>,
    pub sources: Vec<SearchSource>,
}

/// The external translation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate SRT text, returning SRT covering the same indices
    async fn translate_batch(
        &self,
        srt: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String>;

    /// Translate one block's text, returned without SRT framing
    async fn translate_single_block(
        &self,
        text: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String>;

    /// Re-wrap already translated text to the layout limits
    async fn reformat_block(&self, text: &str, context: &TranslationContext) -> Result<String>;

    /// Look up movie or song metadata to build a context from
    async fn search_context(&self, query: &str, kind: ContextKind) -> Result<SearchResults>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the configured backend wrapped in the retry decorator
    pub fn create_translator(config: &TranslateConfig, layout: &LayoutConfig) -> Result<Arc<dyn Translator>> {
        let prompts = PromptBuilder::new(config.target_language.clone(), layout.clone());

        let backend: Arc<dyn Translator> = match config.provider {
            Provider::Gemini => Arc::new(gemini::GeminiTranslator::new(config.clone(), prompts)?),
            Provider::Ollama => Arc::new(ollama::OllamaTranslator::new(config.clone(), prompts)?),
        };

        Ok(Arc::new(RetryingTranslator::new(backend, RetryPolicy::from_config(config))))
    }
}

/// Drop markdown code fences some models wrap their output in
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Map an unsuccessful HTTP status to an error, singling out rate limiting
pub(crate) fn status_error(backend: &str, status: reqwest::StatusCode, body: &str) -> LegendaError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        LegendaError::RateLimit(format!("{} API returned {}", backend, status))
    } else {
        LegendaError::Translation(format!("{} API error {}: {}", backend, status, body))
    }
}

/// Parse the JSON list of candidates a search prompt produces.
///
/// Accepts a bare array or an object with a `results` array, surrounded by
/// prose or code fences. Numeric fields are turned into strings.
pub fn parse_search_results(raw: &str, kind: ContextKind) -> Result<Vec<TranslationContext>> {
    let cleaned = strip_code_fences(raw);
    let start = cleaned.find(['[', '{']);
    let end = cleaned.rfind([']', '}']);
    let json = match (start, end) {
        (Some(s), Some(e)) if e >= s => &cleaned[s..=e],
        _ => {
            debug!("No JSON found in search response: {}", raw);
            return Ok(Vec::new());
        }
    };

    let items = match serde_json::from_str::<Value>(json)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };

    let mut results = Vec::new();
    for item in items.into_iter().take(MAX_SEARCH_RESULTS) {
        let item = stringify_scalars(item);
        let context = match kind {
            ContextKind::Movie => serde_json::from_value::<MovieContext>(item).map(TranslationContext::Movie),
            ContextKind::Music => serde_json::from_value::<SongContext>(item).map(TranslationContext::Song),
        };
        match context {
            Ok(ctx) if !ctx.title().is_empty() => results.push(ctx),
            Ok(_) => debug!("Skipping search result without a title"),
            Err(e) => debug!("Skipping unparseable search result: {}", e),
        }
    }

    Ok(results)
}

fn stringify_scalars(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::Number(n) => Value::String(n.to_string()),
                        Value::Array(parts) => Value::String(
                            parts
                                .iter()
                                .map(|p| p.as_str().map(str::to_string).unwrap_or_else(|| p.to_string()))
                                .collect::<Vec<_>>()
                                .join(", "),
                        ),
                        Value::Null => Value::String(String::new()),
                        other => other,
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        let raw = "```srt\n1\n00:00:01,000 --> 00:00:02,000\nOi\n```";
        assert_eq!(strip_code_fences(raw), "1\n00:00:01,000 --> 00:00:02,000\nOi");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_status_error_detects_rate_limit() {
        let err = status_error("Gemini", reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert!(err.is_rate_limit());

        let err = status_error("Gemini", reqwest::StatusCode::BAD_REQUEST, "{\"status\":\"RESOURCE_EXHAUSTED\"}");
        assert!(err.is_rate_limit());

        let err = status_error("Ollama", reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, LegendaError::Translation(_)));
    }

    #[test]
    fn test_parse_movie_results_from_fenced_array() {
        let raw = "Here you go:\n```json\n[{\"title\":\"Heat\",\"year\":1995,\"director\":\"Michael Mann\",\
                   \"genre\":[\"Crime\",\"Thriller\"],\"description\":\"A heist.\"},{\"year\":\"2001\"}]\n```";
        let results = parse_search_results(raw, ContextKind::Movie).unwrap();

        assert_eq!(results.len(), 1);
        match &results[0] {
            TranslationContext::Movie(movie) => {
                assert_eq!(movie.year, "1995");
                assert_eq!(movie.genre, "Crime, Thriller");
            }
            other => panic!("expected movie, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_song_results_from_object() {
        let raw = r#"{"results":[{"title":"Yesterday","artist":"The Beatles","album":"Help!","year":"1965"}]}"#;
        let results = parse_search_results(raw, ContextKind::Music).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind(), ContextKind::Music);
    }

    #[test]
    fn test_parse_search_results_without_json() {
        assert!(parse_search_results("No results found.", ContextKind::Movie).unwrap().is_empty());
    }
}
