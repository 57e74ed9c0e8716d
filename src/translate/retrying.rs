use std::sync::Arc;

use async_trait::async_trait;

use super::{SearchResults, Translator};
use crate::context::{ContextKind, TranslationContext};
use crate::error::{LegendaError, Result};
use crate::retry::{RetryPolicy, retry_with};

/// Applies the same rate-limit backoff to every call of the wrapped translator.
pub struct RetryingTranslator {
    inner: Arc<dyn Translator>,
    policy: RetryPolicy,
}

impl RetryingTranslator {
    pub fn new(inner: Arc<dyn Translator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Translator for RetryingTranslator {
    async fn translate_batch(
        &self,
        srt: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String> {
        retry_with(&self.policy, LegendaError::is_rate_limit, || {
            self.inner.translate_batch(srt, context, source_language)
        })
        .await
    }

    async fn translate_single_block(
        &self,
        text: &str,
        context: &TranslationContext,
        source_language: &str,
    ) -> Result<String> {
        retry_with(&self.policy, LegendaError::is_rate_limit, || {
            self.inner.translate_single_block(text, context, source_language)
        })
        .await
    }

    async fn reformat_block(&self, text: &str, context: &TranslationContext) -> Result<String> {
        retry_with(&self.policy, LegendaError::is_rate_limit, || {
            self.inner.reformat_block(text, context)
        })
        .await
    }

    async fn search_context(&self, query: &str, kind: ContextKind) -> Result<SearchResults> {
        retry_with(&self.policy, LegendaError::is_rate_limit, || {
            self.inner.search_context(query, kind)
        })
        .await
    }
}
