use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LegendaError;

static YEAR_AND_AFTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}.*").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieContext {
    pub title: String,
    pub year: String,
    pub description: String,
    pub director: String,
    pub genre: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongContext {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub genre: String,
    pub meaning: String,
}

/// Subject matter used to steer the translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranslationContext {
    Movie(MovieContext),
    Song(SongContext),
}

/// Which kind of context a document is translated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Movie,
    Music,
}

impl TranslationContext {
    pub fn kind(&self) -> ContextKind {
        match self {
            TranslationContext::Movie(_) => ContextKind::Movie,
            TranslationContext::Song(_) => ContextKind::Music,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TranslationContext::Movie(movie) => &movie.title,
            TranslationContext::Song(song) => &song.title,
        }
    }

    /// Default context for a freshly selected file: a movie named after it.
    pub fn from_file_name(file_name: &str) -> Self {
        TranslationContext::Movie(MovieContext {
            title: guess_title(file_name),
            ..Default::default()
        })
    }
}

impl fmt::Display for TranslationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationContext::Movie(movie) if movie.year.is_empty() => write!(f, "{}", movie.title),
            TranslationContext::Movie(movie) => write!(f, "{} ({})", movie.title, movie.year),
            TranslationContext::Song(song) => write!(f, "{} - {}", song.artist, song.title),
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Movie => write!(f, "movie"),
            ContextKind::Music => write!(f, "music"),
        }
    }
}

impl FromStr for ContextKind {
    type Err = LegendaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "series" | "tv" => Ok(ContextKind::Movie),
            "music" | "song" => Ok(ContextKind::Music),
            _ => Err(LegendaError::Config(format!(
                "Invalid context kind '{}'. Valid kinds: movie, music",
                s
            ))),
        }
    }
}

/// Guess a title from a release-style file name,
/// e.g. `The.Matrix.1999.1080p.srt` becomes `The Matrix`.
pub fn guess_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let cut = stem.len().saturating_sub(4);
    let stem = match stem.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".srt") => stem[..cut].to_string(),
        _ => stem,
    };

    let spaced = stem.replace(['.', '_'], " ");
    YEAR_AND_AFTER.replace(&spaced, "").trim().to_string()
}
