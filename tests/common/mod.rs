/*!
 * Common test utilities for the legenda test suite
 */

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use legenda::context::{ContextKind, MovieContext, TranslationContext};
use legenda::error::{LegendaError, Result};
use legenda::orchestrator::CancellationToken;
use legenda::subtitle::{self, SubtitleBlock};
use legenda::translate::{SearchResults, Translator};

/// Build an SRT document with one line of dialogue per index
pub fn sample_srt(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| format!("{}\n00:00:{:02},000 --> 00:00:{:02},900\nLine number {}", i, i, i, i))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn movie(title: &str) -> TranslationContext {
    TranslationContext::Movie(MovieContext {
        title: title.to_string(),
        ..Default::default()
    })
}

/// Indices of the blocks in an SRT payload
pub fn indices_in(srt: &str) -> Vec<u32> {
    subtitle::parse(srt).iter().map(|b| b.index).collect()
}

/// Records what the orchestrator asked for
#[derive(Debug, Default)]
pub struct CallLog {
    /// Block indices of every batch, in call order
    pub batches: Vec<Vec<u32>>,
    pub single_blocks: Vec<String>,
    pub reformats: Vec<String>,
    pub searches: Vec<String>,
}

/// Deterministic translator: prefixes every body with the target tag.
///
/// Can be told to fail a given batch call or to cancel a token after one,
/// so tests can stage failures and interruptions.
pub struct ScriptedTranslator {
    log: Arc<Mutex<CallLog>>,
    prefix: String,
    fail_on_batch: Option<usize>,
    cancel_after_batch: Option<(usize, CancellationToken)>,
    search_results: Vec<TranslationContext>,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(CallLog::default())),
            prefix: "[pt]".to_string(),
            fail_on_batch: None,
            cancel_after_batch: None,
            search_results: Vec::new(),
        }
    }

    /// Fail the n-th batch call (1-based)
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Cancel `token` while serving the n-th batch call (1-based)
    pub fn cancelling_after_batch(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after_batch = Some((n, token));
        self
    }

    pub fn with_search_results(mut self, results: Vec<TranslationContext>) -> Self {
        self.search_results = results;
        self
    }

    pub fn log(&self) -> Arc<Mutex<CallLog>> {
        self.log.clone()
    }

    fn tag(&self, text: &str) -> String {
        format!("{} {}", self.prefix, text)
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate_batch(&self, srt: &str, _context: &TranslationContext, _source_language: &str) -> Result<String> {
        let call = {
            let mut log = self.log.lock().unwrap();
            log.batches.push(indices_in(srt));
            log.batches.len()
        };

        if self.fail_on_batch == Some(call) {
            return Err(LegendaError::Translation(format!("scripted failure on batch {}", call)));
        }
        if let Some((n, token)) = &self.cancel_after_batch {
            if *n == call {
                token.cancel();
            }
        }

        let blocks: Vec<SubtitleBlock> = subtitle::parse(srt)
            .into_iter()
            .map(|b| SubtitleBlock {
                original_text: self.tag(&b.original_text),
                ..b
            })
            .collect();

        Ok(subtitle::serialize_original(&blocks))
    }

    async fn translate_single_block(&self, text: &str, _context: &TranslationContext, _source_language: &str) -> Result<String> {
        self.log.lock().unwrap().single_blocks.push(text.to_string());
        Ok(self.tag(text))
    }

    async fn reformat_block(&self, text: &str, _context: &TranslationContext) -> Result<String> {
        self.log.lock().unwrap().reformats.push(text.to_string());
        Ok(text.replacen(' ', "\n", 1))
    }

    async fn search_context(&self, query: &str, _kind: ContextKind) -> Result<SearchResults> {
        self.log.lock().unwrap().searches.push(query.to_string());
        Ok(SearchResults {
            results: self.search_results.clone(),
            sources: Vec::new(),
        })
    }
}
