use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::clean::clean_text;
use crate::config::{Config, Provider};
use crate::context::{ContextKind, MovieContext, SongContext, TranslationContext};
use crate::error::{LegendaError, Result};
use crate::orchestrator::{BatchOptions, BatchOrchestrator, CancellationToken, ProgressObserver, RunReport};
use crate::quality::{LayoutReport, layout_issues};
use crate::session::{FileSnapshotStore, Progress, SessionState, SnapshotStore, TranslationSession};
use crate::subtitle::{self, SubtitleBlock, SubtitleEncoding, read_srt_file_as, write_srt_file};
use crate::translate::ollama::check_ollama_availability;
use crate::translate::{SearchResults, Translator, TranslatorFactory};

/// Context fields given on the command line; each one overrides whatever
/// the file name or a search produced.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub title: Option<String>,
    pub year: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub meaning: Option<String>,
}

impl ContextOverrides {
    /// Build the context for `kind`, starting from `base` when it is of the same kind.
    pub fn apply(&self, kind: ContextKind, base: TranslationContext) -> TranslationContext {
        fn set(field: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        match (kind, base) {
            (ContextKind::Movie, base) => {
                let mut movie = match base {
                    TranslationContext::Movie(movie) => movie,
                    TranslationContext::Song(song) => MovieContext {
                        title: song.title,
                        ..Default::default()
                    },
                };
                set(&mut movie.title, &self.title);
                set(&mut movie.year, &self.year);
                set(&mut movie.director, &self.director);
                set(&mut movie.genre, &self.genre);
                set(&mut movie.description, &self.description);
                TranslationContext::Movie(movie)
            }
            (ContextKind::Music, base) => {
                let mut song = match base {
                    TranslationContext::Song(song) => song,
                    TranslationContext::Movie(movie) => SongContext {
                        title: movie.title,
                        ..Default::default()
                    },
                };
                set(&mut song.title, &self.title);
                set(&mut song.year, &self.year);
                set(&mut song.artist, &self.artist);
                set(&mut song.album, &self.album);
                set(&mut song.genre, &self.genre);
                set(&mut song.meaning, &self.meaning);
                TranslationContext::Song(song)
            }
        }
    }
}

/// Everything needed to start translating a file
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub kind: ContextKind,
    pub overrides: ContextOverrides,
    pub search: Option<String>,
    pub source_language: String,
    /// Only translate this many blocks now; `resume` continues later
    pub limit: Option<usize>,
}

/// Outcome of a translate or resume command
#[derive(Debug, Clone)]
pub struct TranslationSummary {
    pub output: Option<PathBuf>,
    pub report: RunReport,
    pub translated: usize,
    pub total: usize,
    pub layout_issues: Vec<LayoutReport>,
}

impl TranslationSummary {
    pub fn is_complete(&self) -> bool {
        self.translated == self.total
    }
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub session: TranslationSession,
    pub layout_issues: Vec<LayoutReport>,
}

/// Drives an indicatif bar from orchestrator progress
struct ProgressBarObserver {
    bar: ProgressBar,
}

impl ProgressBarObserver {
    fn new(progress: Progress) -> Self {
        let bar = ProgressBar::new(progress.total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_position(progress.current as u64);
        Self { bar }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress(&self, progress: Progress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.current as u64);
    }

    fn on_state(&self, state: SessionState) {
        match state {
            SessionState::Editing => self.bar.finish_with_message("done"),
            SessionState::Error => self.bar.abandon_with_message("failed"),
            _ => {}
        }
    }
}

pub struct Workflow {
    config: Config,
    store: Arc<dyn SnapshotStore>,
    translator: Option<Arc<dyn Translator>>,
    show_progress: bool,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(FileSnapshotStore::new(&config.storage.dir));

        Ok(Self {
            config,
            store,
            translator: None,
            show_progress: true,
        })
    }

    /// Use a ready-made translator instead of building one from the config
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Select a file, build its context and translate it.
    pub async fn translate(&self, request: TranslateRequest, cancel: &CancellationToken) -> Result<TranslationSummary> {
        let input = request.input.as_path();
        info!("Translating subtitles: {}", input.display());

        let text = read_srt_file_as(input, self.encoding()).await?;
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| LegendaError::Config("Invalid subtitle filename".to_string()))?;

        match self.store.load().await {
            Ok(Some(previous)) => {
                let pending = previous.blocks.iter().filter(|b| !b.is_translated()).count();
                if previous.state != SessionState::Idle && pending > 0 {
                    warn!(
                        "Discarding unfinished session for {} ({} blocks pending)",
                        previous.file_name, pending
                    );
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable snapshot: {}", e),
        }

        let mut session = TranslationSession::new();
        session.select_document(&text, &file_name)?;
        if session.blocks().is_empty() {
            return Err(LegendaError::InvalidDocument(format!("{} has no subtitle blocks", file_name)));
        }

        let translator = self.translator().await?;
        let base = match &request.search {
            Some(query) => self.searched_context(translator.as_ref(), query, request.kind, &session).await,
            None => TranslationContext::from_file_name(&file_name),
        };
        let context = request.overrides.apply(request.kind, base);
        info!("Translation context: {}", context);

        let orchestrator = self.orchestrator(translator, session.progress());
        let report = match request.limit {
            Some(limit) => {
                session.set_context(context);
                session.source_language = request.source_language.clone();
                orchestrator.translate_next_chunk(&mut session, limit, cancel).await?
            }
            None => {
                orchestrator
                    .start_translation(&mut session, context, &request.source_language, cancel)
                    .await?
            }
        };

        let output = request
            .output
            .unwrap_or_else(|| output_path_for(input, &self.config.translate.target_language));
        self.finish(&session, report, Some(output)).await
    }

    /// Continue the saved session with the blocks still untranslated.
    pub async fn resume(
        &self,
        output: Option<PathBuf>,
        limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<TranslationSummary> {
        let mut session = self.load_session().await?;
        info!(
            "Resuming {} ({} of {} blocks translated)",
            session.file_name(),
            session.translated_count(),
            session.blocks().len()
        );

        let translator = self.translator().await?;
        let orchestrator = self.orchestrator(translator, session.progress());
        let report = match limit {
            Some(limit) => orchestrator.translate_next_chunk(&mut session, limit, cancel).await?,
            None => orchestrator.resume_translation(&mut session, cancel).await?,
        };

        let output = output.unwrap_or_else(|| {
            output_path_for(Path::new(session.file_name()), &self.config.translate.target_language)
        });
        self.finish(&session, report, Some(output)).await
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let session = match self.store.load().await? {
            Some(snapshot) => TranslationSession::from_snapshot(snapshot),
            None => TranslationSession::new(),
        };
        let layout_issues = layout_issues(session.blocks(), &self.config.layout);

        Ok(StatusReport { session, layout_issues })
    }

    pub async fn edit(&self, index: u32, text: &str) -> Result<()> {
        let mut session = self.load_session().await?;
        session.edit_block(index, text)?;
        self.store.save(&session.snapshot()).await?;
        info!("Block {} updated", index);
        Ok(())
    }

    /// Translate one block again and return its new text.
    pub async fn retranslate(&self, index: u32) -> Result<String> {
        let mut session = self.load_session().await?;
        let orchestrator = BatchOrchestrator::new(self.translator().await?, self.batch_options()).with_store(self.store.clone());
        orchestrator.retranslate_block(&mut session, index).await?;
        Ok(block_text(&session, index))
    }

    /// Re-wrap one block's translation and return its new text.
    pub async fn reformat(&self, index: u32) -> Result<String> {
        let mut session = self.load_session().await?;
        let orchestrator = BatchOrchestrator::new(self.translator().await?, self.batch_options()).with_store(self.store.clone());
        orchestrator.reformat_block(&mut session, index).await?;
        Ok(block_text(&session, index))
    }

    /// Write the translated document of the saved session.
    pub async fn export<P: AsRef<Path>>(&self, output: P) -> Result<usize> {
        let session = self.load_session().await?;
        let untranslated = session.untranslated_count();
        if untranslated > 0 {
            warn!("{} blocks are not translated yet and will be empty", untranslated);
        }
        write_srt_file(output.as_ref(), &session.export()).await?;
        info!("Exported {}", output.as_ref().display());
        Ok(session.blocks().len())
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await?;
        info!("Session cleared");
        Ok(())
    }

    /// Strip caption artifacts from one SRT file or every `.srt` under a directory.
    ///
    /// Returns the files written.
    pub async fn clean<P: AsRef<Path>>(&self, input: P, output: Option<PathBuf>) -> Result<Vec<PathBuf>> {
        let input = input.as_ref();
        if !input.exists() {
            return Err(LegendaError::FileNotFound(input.display().to_string()));
        }

        if input.is_file() {
            let target = output.unwrap_or_else(|| cleaned_path_for(input));
            clean_file(input, &target, self.encoding()).await?;
            return Ok(vec![target]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_srt = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
            let already_clean = path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().ends_with("_clean"));
            if entry.file_type().is_file() && is_srt && !already_clean {
                files.push(path.to_path_buf());
            }
        }

        info!("Found {} subtitle files to clean", files.len());

        let mut written = Vec::new();
        for path in files {
            let target = match &output {
                Some(dir) => {
                    let relative = path.strip_prefix(input).unwrap_or(&path);
                    dir.join(relative)
                }
                None => cleaned_path_for(&path),
            };
            match clean_file(&path, &target, self.encoding()).await {
                Ok(()) => written.push(target),
                Err(e) => warn!("Failed to clean {}: {}", path.display(), e),
            }
        }

        Ok(written)
    }

    /// Layout problems of an SRT file, read as already translated text.
    pub async fn check<P: AsRef<Path>>(&self, input: P) -> Result<Vec<LayoutReport>> {
        let text = read_srt_file_as(input, self.encoding()).await?;
        let blocks: Vec<SubtitleBlock> = subtitle::parse(&text)
            .into_iter()
            .map(|b| SubtitleBlock {
                translated_text: b.original_text.clone(),
                ..b
            })
            .collect();

        Ok(layout_issues(&blocks, &self.config.layout))
    }

    pub async fn search(&self, query: &str, kind: ContextKind) -> Result<SearchResults> {
        let translator = self.translator().await?;
        translator.search_context(query, kind).await
    }

    async fn finish(
        &self,
        session: &TranslationSession,
        report: RunReport,
        output: Option<PathBuf>,
    ) -> Result<TranslationSummary> {
        let translated = session.translated_count();
        let output = match output {
            Some(path) if translated > 0 => {
                write_srt_file(&path, &session.export()).await?;
                info!("Wrote {}", path.display());
                Some(path)
            }
            _ => None,
        };

        Ok(TranslationSummary {
            output,
            report,
            translated,
            total: session.blocks().len(),
            layout_issues: layout_issues(session.blocks(), &self.config.layout),
        })
    }

    async fn searched_context(
        &self,
        translator: &dyn Translator,
        query: &str,
        kind: ContextKind,
        session: &TranslationSession,
    ) -> TranslationContext {
        let fallback = || {
            session
                .context()
                .cloned()
                .unwrap_or_else(|| TranslationContext::from_file_name(session.file_name()))
        };

        match translator.search_context(query, kind).await {
            Ok(found) => {
                for source in &found.sources {
                    info!("Search source: {} ({})", source.title, source.uri);
                }
                match found.results.into_iter().next() {
                    Some(context) => context,
                    None => {
                        warn!("No {} found for '{}', using the file name", kind, query);
                        fallback()
                    }
                }
            }
            Err(e) => {
                warn!("Context search failed: {}", e);
                fallback()
            }
        }
    }

    async fn load_session(&self) -> Result<TranslationSession> {
        match self.store.load().await? {
            Some(snapshot) if snapshot.state != SessionState::Idle => Ok(TranslationSession::from_snapshot(snapshot)),
            _ => Err(LegendaError::InvalidState(
                "no saved session, run `translate` first".to_string(),
            )),
        }
    }

    async fn translator(&self) -> Result<Arc<dyn Translator>> {
        if let Some(translator) = &self.translator {
            return Ok(translator.clone());
        }

        if self.config.translate.provider == Provider::Ollama {
            check_ollama_availability(&self.config.translate.endpoint, &self.config.translate.model).await?;
        }
        TranslatorFactory::create_translator(&self.config.translate, &self.config.layout)
    }

    fn encoding(&self) -> SubtitleEncoding {
        self.config.input.encoding
    }

    fn batch_options(&self) -> BatchOptions {
        BatchOptions::from_config(&self.config)
    }

    fn orchestrator(&self, translator: Arc<dyn Translator>, progress: Progress) -> BatchOrchestrator {
        let orchestrator = BatchOrchestrator::new(translator, self.batch_options()).with_store(self.store.clone());
        if self.show_progress {
            orchestrator.with_observer(Arc::new(ProgressBarObserver::new(progress)))
        } else {
            orchestrator
        }
    }
}

fn block_text(session: &TranslationSession, index: u32) -> String {
    session
        .block(index)
        .map(|b| b.translated_text.clone())
        .unwrap_or_default()
}

/// `<stem>_<target language, lowercased>.srt` next to the input
pub fn output_path_for(input: &Path, target_language: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subtitles".to_string());
    input.with_file_name(format!("{}_{}.srt", stem, target_language.to_lowercase()))
}

fn cleaned_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subtitles".to_string());
    input.with_file_name(format!("{}_clean.srt", stem))
}

/// Clean every block body, dropping blocks left with nothing to show.
pub fn clean_document(text: &str) -> String {
    let blocks: Vec<SubtitleBlock> = subtitle::parse(text)
        .into_iter()
        .filter_map(|block| {
            let cleaned = clean_text(&block.original_text);
            (!cleaned.is_empty()).then(|| SubtitleBlock {
                original_text: cleaned,
                ..block
            })
        })
        .collect();

    subtitle::serialize_original(&blocks)
}

async fn clean_file(input: &Path, output: &Path, encoding: SubtitleEncoding) -> Result<()> {
    let text = read_srt_file_as(input, encoding).await?;
    let before = subtitle::parse(&text).len();
    let cleaned = clean_document(&text);
    let after = subtitle::parse(&cleaned).len();

    write_srt_file(output, &cleaned).await?;
    info!(
        "Cleaned {} -> {} ({} of {} blocks kept)",
        input.display(),
        output.display(),
        after,
        before
    );
    Ok(())
}
