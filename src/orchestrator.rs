use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clean::clean_text;
use crate::config::Config;
use crate::context::TranslationContext;
use crate::error::{LegendaError, Result};
use crate::session::{Progress, SessionState, SnapshotStore, TranslationSession};
use crate::subtitle::{self, SubtitleBlock};
use crate::translate::Translator;

/// Cooperative stop signal, checked once per batch boundary.
///
/// A call already in flight is never interrupted; only the next batch is skipped.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Receives lifecycle updates, e.g. to drive a progress bar
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: Progress);

    fn on_state(&self, _state: SessionState) {}
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Pause between batches to stay clear of rate limits
    pub batch_delay: Duration,
    pub clean_source: bool,
    pub clean_output: bool,
}

impl BatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch.batch_size,
            batch_delay: config.batch.delay(),
            clean_source: config.cleaning.clean_source,
            clean_output: config.cleaning.clean_output,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 30,
            batch_delay: Duration::from_secs(1),
            clean_source: false,
            clean_output: false,
        }
    }
}

/// What a run of the batch loop did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Translate calls issued
    pub batches_sent: usize,
    /// Blocks whose translation was overwritten by a response
    pub blocks_merged: usize,
    pub cancelled: bool,
}

/// Drives sequential batch translation of one session.
pub struct BatchOrchestrator {
    translator: Arc<dyn Translator>,
    options: BatchOptions,
    store: Option<Arc<dyn SnapshotStore>>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl BatchOrchestrator {
    pub fn new(translator: Arc<dyn Translator>, options: BatchOptions) -> Self {
        Self {
            translator,
            options,
            store: None,
            observer: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    /// Translate every block of the selected document from the start.
    pub async fn start_translation(
        &self,
        session: &mut TranslationSession,
        context: TranslationContext,
        source_language: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        self.ensure_document(session, "start a translation")?;

        info!("Starting translation of {} as {}", session.file_name, context);

        session.context = Some(context);
        session.source_language = source_language.to_string();
        session.last_error = None;
        session.progress = Progress {
            current: 0,
            total: session.blocks.len(),
        };

        let blocks = session.blocks.clone();
        self.run_batches(session, blocks, cancel).await
    }

    /// Translate only the blocks that are still empty, in document order.
    pub async fn resume_translation(
        &self,
        session: &mut TranslationSession,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        self.translate_pending(session, None, cancel).await
    }

    /// Translate at most `limit` of the blocks that are still empty.
    pub async fn translate_next_chunk(
        &self,
        session: &mut TranslationSession,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        self.translate_pending(session, Some(limit), cancel).await
    }

    async fn translate_pending(
        &self,
        session: &mut TranslationSession,
        limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        self.ensure_document(session, "resume a translation")?;

        let pending: Vec<SubtitleBlock> = session
            .blocks
            .iter()
            .filter(|b| !b.is_translated() && self.outgoing(b).is_some())
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        if pending.is_empty() {
            info!("Nothing left to translate");
            return Ok(RunReport::default());
        }

        // blocks that clean down to nothing were settled by an earlier run
        let settled = session
            .blocks
            .iter()
            .filter(|b| b.is_translated() || self.outgoing(b).is_none())
            .count();

        info!("Resuming translation with {} pending blocks", pending.len());
        session.last_error = None;
        session.progress = Progress {
            current: settled,
            total: session.blocks.len(),
        };

        self.run_batches(session, pending, cancel).await
    }

    /// The batch loop.
    ///
    /// Splits `blocks` into runs of `batch_size`, translates them one at a time
    /// and merges each response into the session by block index. A failed
    /// call leaves every earlier merge in place and moves the session to
    /// `Error`; cancellation moves it to `Editing` like normal completion.
    pub async fn run_batches(
        &self,
        session: &mut TranslationSession,
        blocks: Vec<SubtitleBlock>,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let context = session.context.clone().ok_or(LegendaError::MissingContext)?;
        let source_language = session.source_language.clone();

        let requested = blocks.len();
        let payload: Vec<SubtitleBlock> = blocks.iter().filter_map(|b| self.outgoing(b)).collect();
        let skipped = requested - payload.len();
        if skipped > 0 {
            info!("Skipping {} blocks with nothing left to translate after cleanup", skipped);
        }

        self.transition(session, SessionState::Translating).await;

        let total = session.progress.total;
        let base = session.progress.current + skipped;
        let batches: Vec<&[SubtitleBlock]> = payload.chunks(self.options.batch_size.max(1)).collect();
        let mut report = RunReport::default();
        let mut processed = 0;
        session.progress.current = total.min(base);

        for (i, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Translation stopped before batch {}/{}", i + 1, batches.len());
                report.cancelled = true;
                break;
            }

            let srt = subtitle::serialize_original(batch);
            info!(
                "Translating batch {}/{} (blocks {}-{})",
                i + 1,
                batches.len(),
                batch[0].index,
                batch[batch.len() - 1].index
            );

            report.batches_sent += 1;
            let response = match self.translator.translate_batch(&srt, &context, &source_language).await {
                Ok(response) => response,
                Err(e) => {
                    error!("Batch {}/{} failed: {}", i + 1, batches.len(), e);
                    session.last_error = Some(e.to_string());
                    self.transition(session, SessionState::Error).await;
                    return Err(e);
                }
            };

            report.blocks_merged += self.merge(session, &response);
            if report.blocks_merged < processed + batch.len() {
                debug!("Batch {} came back with fewer blocks than were sent", i + 1);
            }

            processed += batch.len();
            session.progress.current = total.min(base + processed);
            self.notify_progress(session.progress);
            self.persist(session).await;

            if i + 1 < batches.len() && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }
        }

        self.transition(session, SessionState::Editing).await;

        info!(
            "Translation run finished: {} batches, {} blocks merged{}",
            report.batches_sent,
            report.blocks_merged,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    /// Translate one block again from its source text.
    pub async fn retranslate_block(&self, session: &mut TranslationSession, index: u32) -> Result<()> {
        self.ensure_editable(session)?;
        let context = session.context.clone().ok_or(LegendaError::MissingContext)?;
        let block = session.block(index).cloned().ok_or(LegendaError::BlockNotFound(index))?;

        let source = self
            .outgoing(&block)
            .map(|b| b.original_text)
            .unwrap_or(block.original_text);

        info!("Retranslating block {}", index);
        session.updating = Some(index);
        let result = self
            .translator
            .translate_single_block(&source, &context, &session.source_language)
            .await;
        session.updating = None;

        let text = self.finish_output(&result?);
        session.set_translation(index, text)?;
        self.persist(session).await;
        Ok(())
    }

    /// Re-wrap one block's translation to the layout limits.
    pub async fn reformat_block(&self, session: &mut TranslationSession, index: u32) -> Result<()> {
        self.ensure_editable(session)?;
        let context = session.context.clone().ok_or(LegendaError::MissingContext)?;
        let block = session.block(index).cloned().ok_or(LegendaError::BlockNotFound(index))?;

        if !block.is_translated() {
            return Err(LegendaError::InvalidState(format!(
                "block {} has no translation to reformat",
                index
            )));
        }

        info!("Reformatting block {}", index);
        session.updating = Some(index);
        let result = self.translator.reformat_block(&block.translated_text, &context).await;
        session.updating = None;

        session.set_translation(index, result?.trim().to_string())?;
        self.persist(session).await;
        Ok(())
    }

    /// Hand-edit a block and persist the change.
    pub async fn edit_block(&self, session: &mut TranslationSession, index: u32, text: &str) -> Result<()> {
        session.edit_block(index, text)?;
        self.persist(session).await;
        Ok(())
    }

    /// Drop the document and its snapshot.
    pub async fn reset(&self, session: &mut TranslationSession) -> Result<()> {
        session.reset();
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        self.notify_state(SessionState::Idle);
        Ok(())
    }

    /// Write the session snapshot. Failures are logged, never propagated.
    pub async fn persist(&self, session: &TranslationSession) {
        if session.state == SessionState::Idle {
            return;
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session.snapshot()).await {
                warn!("Failed to save progress snapshot: {}", e);
            }
        }
    }

    /// Merge a translated SRT response by index and return the number of blocks updated.
    fn merge(&self, session: &mut TranslationSession, response: &str) -> usize {
        let positions = subtitle::position_index(&session.blocks);
        let mut merged = 0;

        for returned in subtitle::parse(response) {
            match positions.get(&returned.index) {
                Some(&pos) => {
                    session.blocks[pos].translated_text = self.finish_output(&returned.original_text);
                    merged += 1;
                }
                None => debug!("Ignoring translated block with unknown index {}", returned.index),
            }
        }

        merged
    }

    /// The block as it is sent out, or `None` when cleanup leaves nothing to translate.
    fn outgoing(&self, block: &SubtitleBlock) -> Option<SubtitleBlock> {
        if !self.options.clean_source {
            return Some(block.clone());
        }

        let cleaned = clean_text(&block.original_text);
        if cleaned.is_empty() {
            return None;
        }
        Some(SubtitleBlock {
            original_text: cleaned,
            ..block.clone()
        })
    }

    // A translation cleaned down to nothing is kept as returned
    fn finish_output(&self, text: &str) -> String {
        let text = text.trim();
        if self.options.clean_output {
            let cleaned = clean_text(text);
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
        text.to_string()
    }

    fn ensure_document(&self, session: &TranslationSession, action: &str) -> Result<()> {
        session.ensure_not_translating(action)?;
        if session.state == SessionState::Idle {
            return Err(LegendaError::InvalidState(format!("cannot {} without a document", action)));
        }
        Ok(())
    }

    fn ensure_editable(&self, session: &TranslationSession) -> Result<()> {
        match session.state {
            SessionState::Editing | SessionState::Error | SessionState::Selected => Ok(()),
            SessionState::Translating => Err(LegendaError::InvalidState(
                "cannot change a block while a translation is running".to_string(),
            )),
            SessionState::Idle => Err(LegendaError::InvalidState("no document selected".to_string())),
        }
    }

    async fn transition(&self, session: &mut TranslationSession, state: SessionState) {
        debug!("Session {} -> {}", session.state, state);
        session.state = state;
        self.notify_state(state);
        self.persist(session).await;
    }

    fn notify_progress(&self, progress: Progress) {
        if let Some(observer) = &self.observer {
            observer.on_progress(progress);
        }
    }

    fn notify_state(&self, state: SessionState) {
        if let Some(observer) = &self.observer {
            observer.on_state(state);
        }
    }
}
