//! Per-document translation state and its persisted snapshot.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::TranslationContext;
use crate::error::{LegendaError, Result};
use crate::subtitle::{self, SubtitleBlock};

pub const SNAPSHOT_FILE: &str = "progress_v3.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Selected,
    Translating,
    Editing,
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Selected => "selected",
            SessionState::Translating => "translating",
            SessionState::Editing => "editing",
            SessionState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Durable form of a session. Transient editor state is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub original_text: String,
    pub blocks: Vec<SubtitleBlock>,
    pub context: Option<TranslationContext>,
    pub file_name: String,
    pub progress: Progress,
    pub source_language: String,
    #[serde(default)]
    pub last_error: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// One uploaded document moving through the translation lifecycle.
#[derive(Debug, Clone)]
pub struct TranslationSession {
    id: Uuid,
    pub(crate) state: SessionState,
    pub(crate) original_text: String,
    pub(crate) file_name: String,
    pub(crate) blocks: Vec<SubtitleBlock>,
    pub(crate) context: Option<TranslationContext>,
    pub(crate) source_language: String,
    pub(crate) progress: Progress,
    pub(crate) last_error: Option<String>,
    // block being retranslated or reformatted; editor-only
    pub(crate) updating: Option<u32>,
}

impl Default for TranslationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            original_text: String::new(),
            file_name: String::new(),
            blocks: Vec::new(),
            context: None,
            source_language: "en".to_string(),
            progress: Progress::default(),
            last_error: None,
            updating: None,
        }
    }

    /// Accept a document. Invalid documents are rejected without any state change.
    pub fn select_document(&mut self, text: &str, file_name: &str) -> Result<()> {
        self.ensure_not_translating("select a document")?;

        if !subtitle::is_valid_srt(text) {
            return Err(LegendaError::InvalidDocument(format!(
                "{} does not start with a valid SRT block",
                file_name
            )));
        }

        let blocks = subtitle::parse(text);
        info!("Selected {} with {} subtitle blocks", file_name, blocks.len());

        *self = Self {
            id: Uuid::new_v4(),
            state: SessionState::Selected,
            original_text: text.to_string(),
            file_name: file_name.to_string(),
            progress: Progress { current: 0, total: blocks.len() },
            blocks,
            context: Some(TranslationContext::from_file_name(file_name)),
            ..Self::new()
        };
        Ok(())
    }

    /// Overwrite one block's translation by hand.
    pub fn edit_block(&mut self, index: u32, text: &str) -> Result<()> {
        self.ensure_not_translating("edit a block")?;
        self.set_translation(index, text.to_string())
    }

    /// Discard the document and return to `Idle`.
    pub fn reset(&mut self) {
        info!("Resetting session {}", self.id);
        *self = Self::new();
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn blocks(&self) -> &[SubtitleBlock] {
        &self.blocks
    }

    pub fn block(&self, index: u32) -> Option<&SubtitleBlock> {
        self.position(index).map(|pos| &self.blocks[pos])
    }

    pub fn context(&self) -> Option<&TranslationContext> {
        self.context.as_ref()
    }

    pub fn set_context(&mut self, context: TranslationContext) {
        self.context = Some(context);
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_updating(&self, index: u32) -> bool {
        self.updating == Some(index)
    }

    pub fn translated_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_translated()).count()
    }

    pub fn untranslated_count(&self) -> usize {
        self.blocks.len() - self.translated_count()
    }

    /// Translated document; untranslated blocks keep an empty body
    pub fn export(&self) -> String {
        subtitle::serialize_translated(&self.blocks)
    }

    /// Project the session onto its durable form.
    ///
    /// A session caught mid-translation is stored as `Editing` so that a
    /// restart offers to resume instead of pretending a loop is running.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = match self.state {
            SessionState::Translating => SessionState::Editing,
            other => other,
        };

        ProgressSnapshot {
            session_id: self.id,
            state,
            original_text: self.original_text.clone(),
            blocks: self.blocks.clone(),
            context: self.context.clone(),
            file_name: self.file_name.clone(),
            progress: self.progress,
            source_language: self.source_language.clone(),
            last_error: self.last_error.clone(),
            saved_at: Utc::now(),
        }
    }

    pub fn from_snapshot(snapshot: ProgressSnapshot) -> Self {
        Self {
            id: snapshot.session_id,
            state: snapshot.state,
            original_text: snapshot.original_text,
            file_name: snapshot.file_name,
            blocks: snapshot.blocks,
            context: snapshot.context,
            source_language: snapshot.source_language,
            progress: snapshot.progress,
            last_error: snapshot.last_error,
            updating: None,
        }
    }

    pub(crate) fn position(&self, index: u32) -> Option<usize> {
        // last duplicate wins, as in every other lookup by index
        self.blocks.iter().rposition(|b| b.index == index)
    }

    pub(crate) fn set_translation(&mut self, index: u32, text: String) -> Result<()> {
        let pos = self.position(index).ok_or(LegendaError::BlockNotFound(index))?;
        self.blocks[pos].translated_text = text;
        Ok(())
    }

    pub(crate) fn ensure_not_translating(&self, action: &str) -> Result<()> {
        if self.state == SessionState::Translating {
            return Err(LegendaError::InvalidState(format!(
                "cannot {} while a translation is running",
                action
            )));
        }
        Ok(())
    }
}

/// Durable storage for the progress snapshot
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<ProgressSnapshot>>;
    async fn save(&self, snapshot: &ProgressSnapshot) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Stores the snapshot as a JSON file, replaced atomically on every save
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            path: dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<ProgressSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let snapshot = serde_json::from_str(&content)
            .map_err(|e| LegendaError::Storage(format!("Corrupt snapshot {}: {}", self.path.display(), e)))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        let content = serde_json::to_vec_pretty(snapshot)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;

            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            tmp.write_all(&content)?;
            tmp.persist(&path)
                .map_err(|e| LegendaError::Storage(format!("Failed to write snapshot: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| LegendaError::Storage(format!("Snapshot writer panicked: {}", e)))??;

        debug!("Saved progress snapshot to {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            tokio::fs::remove_file(&self.path).await?;
            info!("Removed progress snapshot {}", self.path.display());
        }
        Ok(())
    }
}
