use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{PromptBuilder, SearchResults, Translator, parse_search_results, status_error, strip_code_fences};
use crate::config::TranslateConfig;
use crate::context::{ContextKind, TranslationContext};
use crate::error::{LegendaError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

/// Local Ollama backend
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
    prompts: PromptBuilder,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig, prompts: PromptBuilder) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config, prompts })
    }

    async fn generate(&self, model: &str, prompt: String, json_format: bool) -> Result<String> {
        let request = GenerateRequest {
            model: model.to_string(),
            prompt,
            stream: false,
            format: json_format.then(|| "json".to_string()),
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));

        debug!("Sending generation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LegendaError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("Ollama", status, &error_text));
        }

        let generation: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LegendaError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = generation.response.trim().to_string();

        debug!("Raw Ollama response: {}", raw_response);

        if raw_response.is_empty() {
            return Err(LegendaError::Translation("Empty translation received".to_string()));
        }

        Ok(raw_response)
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate_batch(
        &self,
        srt: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String> {
        let prompt = self.prompts.batch(srt, context, source_language);
        let text = self.generate(&self.config.model, prompt, false).await?;
        Ok(strip_code_fences(&text))
    }

    async fn translate_single_block(
        &self,
        text: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String> {
        let prompt = self.prompts.single_block(text, context, source_language);
        let text = self.generate(&self.config.fast_model, prompt, false).await?;
        Ok(strip_code_fences(&text))
    }

    async fn reformat_block(&self, text: &str, context: &TranslationContext) -> Result<String> {
        let prompt = self.prompts.reformat(text, context);
        let text = self.generate(&self.config.fast_model, prompt, false).await?;
        Ok(strip_code_fences(&text))
    }

    async fn search_context(&self, query: &str, kind: ContextKind) -> Result<SearchResults> {
        info!("Searching {} context for '{}'", kind, query);

        // JSON mode only yields objects, so ask for a wrapper around the list
        let prompt = format!(
            "{}\nWrap the array in an object: {{\"results\": [...]}}.",
            self.prompts.search(query, kind)
        );
        let text = self.generate(&self.config.fast_model, prompt, true).await?;

        Ok(SearchResults {
            results: parse_search_results(&text, kind)?,
            sources: Vec::new(),
        })
    }
}

/// Check if Ollama is available and the model is pulled
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&json!({ "name": model }))
        .send()
        .await
        .map_err(|e| LegendaError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(LegendaError::Translation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_format_unless_json() {
        let request = GenerateRequest {
            model: "llama3.2:3b".to_string(),
            prompt: "hi".to_string(),
            stream: false,
            format: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("format").is_none());
        assert_eq!(json["stream"], false);
    }
}
