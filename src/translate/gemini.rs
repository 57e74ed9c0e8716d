use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{PromptBuilder, SearchResults, SearchSource, Translator, parse_search_results, status_error, strip_code_fences};
use crate::config::TranslateConfig;
use crate::context::{ContextKind, TranslationContext};
use crate::error::{LegendaError, Result};

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

/// Text returned by a generation call, plus any search grounding
struct Generation {
    text: String,
    sources: Vec<SearchSource>,
}

/// Google Gemini backend
pub struct GeminiTranslator {
    client: Client,
    config: TranslateConfig,
    prompts: PromptBuilder,
    api_key: String,
}

impl GeminiTranslator {
    pub fn new(config: TranslateConfig, prompts: PromptBuilder) -> Result<Self> {
        let api_key = config.api_key()?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            config,
            prompts,
            api_key,
        })
    }

    async fn generate(&self, model: &str, prompt: String, grounded: bool) -> Result<Generation> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        );

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if grounded {
            body["tools"] = json!([{ "google_search": {} }]);
        }

        debug!("Sending Gemini request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LegendaError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("Gemini", status, &error_text));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| LegendaError::Translation(format!("Failed to parse response: {}", e)))?;
        let parsed: GenerateContentResponse = serde_json::from_value(raw)?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LegendaError::Translation("Gemini returned no candidates".to_string()))?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LegendaError::Translation(format!(
                "Empty response received (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let sources = candidate
            .grounding_metadata
            .map(|m| {
                m.grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| match web.uri {
                        Some(uri) => Some(SearchSource {
                            title: web.title.unwrap_or_else(|| uri.clone()),
                            uri,
                        }),
                        None => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Generation { text, sources })
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate_batch(
        &self,
        srt: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String> {
        let prompt = self.prompts.batch(srt, context, source_language);
        let generation = self.generate(&self.config.model, prompt, false).await?;
        Ok(strip_code_fences(&generation.text))
    }

    async fn translate_single_block(
        &self,
        text: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String> {
        let prompt = self.prompts.single_block(text, context, source_language);
        let generation = self.generate(&self.config.fast_model, prompt, false).await?;
        Ok(strip_code_fences(&generation.text))
    }

    async fn reformat_block(&self, text: &str, context: &TranslationContext) -> Result<String> {
        let prompt = self.prompts.reformat(text, context);
        let generation = self.generate(&self.config.fast_model, prompt, false).await?;
        Ok(strip_code_fences(&generation.text))
    }

    async fn search_context(&self, query: &str, kind: ContextKind) -> Result<SearchResults> {
        info!("Searching {} context for '{}'", kind, query);

        let prompt = self.prompts.search(query, kind);
        let generation = self.generate(&self.config.fast_model, prompt, true).await?;
        let results = parse_search_results(&generation.text, kind)?;

        Ok(SearchResults {
            results,
            sources: generation.sources,
        })
    }
}
