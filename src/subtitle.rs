use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use encoding_rs::WINDOWS_1252;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{LegendaError, Result};

static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

// Index line, timestamp line, then at least one line of content
static FIRST_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*(\d+)\s*\n(\d{2}:\d{2}:\d{2},\d{3}\s*-->\s*\d{2}:\d{2}:\d{2},\d{3})\s*\n(.+)")
        .unwrap()
});

const BOM: char = '\u{feff}';

/// Character encoding of an SRT file on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleEncoding {
    /// UTF-8, falling back to Windows-1252 when the bytes are not valid UTF-8
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "utf-8")]
    Utf8,
    /// Western: Windows-1252, a superset of ISO-8859-1 for printable text
    #[serde(rename = "windows-1252")]
    Windows1252,
}

impl fmt::Display for SubtitleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleEncoding::Auto => write!(f, "auto"),
            SubtitleEncoding::Utf8 => write!(f, "utf-8"),
            SubtitleEncoding::Windows1252 => write!(f, "windows-1252"),
        }
    }
}

impl FromStr for SubtitleEncoding {
    type Err = LegendaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(SubtitleEncoding::Auto),
            "utf-8" | "utf8" => Ok(SubtitleEncoding::Utf8),
            "windows-1252" | "cp1252" | "iso-8859-1" | "latin1" | "western" => Ok(SubtitleEncoding::Windows1252),
            _ => Err(LegendaError::Config(format!(
                "Invalid encoding '{}'. Valid encodings: auto, utf-8, windows-1252",
                s
            ))),
        }
    }
}

/// One subtitle cue.
///
/// `timestamp` is carried verbatim and never interpreted. An empty
/// `translated_text` means the block has not been translated yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleBlock {
    pub index: u32,
    pub timestamp: String,
    pub original_text: String,
    #[serde(default)]
    pub translated_text: String,
}

impl SubtitleBlock {
    pub fn new(index: u32, timestamp: impl Into<String>, original_text: impl Into<String>) -> Self {
        Self {
            index,
            timestamp: timestamp.into(),
            original_text: original_text.into(),
            translated_text: String::new(),
        }
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.is_empty()
    }
}

/// Parse SRT text into blocks, silently dropping malformed ones.
pub fn parse(text: &str) -> Vec<SubtitleBlock> {
    let text = text.trim_start_matches(BOM).trim();
    if text.is_empty() {
        return Vec::new();
    }

    BLOCK_SEPARATOR
        .split(text)
        .filter_map(|raw| {
            let block = parse_block(raw);
            if block.is_none() {
                debug!("Dropping malformed SRT block: {:?}", raw);
            }
            block
        })
        .collect()
}

fn parse_block(raw: &str) -> Option<SubtitleBlock> {
    let lines: Vec<&str> = raw.split('\n').collect();

    let index = lines.first()?.trim().parse::<u32>().ok()?;
    let timestamp = lines.get(1)?;
    if timestamp.is_empty() {
        return None;
    }

    let original_text = lines[2..].join("\n");
    if original_text.is_empty() {
        return None;
    }

    Some(SubtitleBlock::new(index, *timestamp, original_text))
}

/// Serialize blocks using their source text.
pub fn serialize_original(blocks: &[SubtitleBlock]) -> String {
    serialize_with(blocks, |b| &b.original_text)
}

/// Serialize blocks using their translated text.
pub fn serialize_translated(blocks: &[SubtitleBlock]) -> String {
    serialize_with(blocks, |b| &b.translated_text)
}

fn serialize_with<'a, F>(blocks: &'a [SubtitleBlock], body: F) -> String
where
    F: Fn(&'a SubtitleBlock) -> &'a str,
{
    blocks
        .iter()
        .map(|b| format!("{}\n{}\n{}", b.index, b.timestamp, body(b)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cheap structural sniff of the first block. Later blocks are not checked.
pub fn is_valid_srt(text: &str) -> bool {
    let text = text.trim_start_matches(BOM).trim();
    if text.is_empty() {
        return false;
    }

    let first_block = BLOCK_SEPARATOR.split(text).next().unwrap_or_default();
    FIRST_BLOCK.is_match(first_block)
}

/// Map from block index to its position. Later duplicates win.
pub fn position_index(blocks: &[SubtitleBlock]) -> HashMap<u32, usize> {
    blocks
        .iter()
        .enumerate()
        .map(|(pos, block)| (block.index, pos))
        .collect()
}

/// Read an SRT file, detecting its encoding.
pub async fn read_srt_file<P: AsRef<Path>>(path: P) -> Result<String> {
    read_srt_file_as(path, SubtitleEncoding::Auto).await
}

/// Read an SRT file in the given encoding, dropping a UTF-8 BOM and
/// normalising line endings.
pub async fn read_srt_file_as<P: AsRef<Path>>(path: P, encoding: SubtitleEncoding) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LegendaError::FileNotFound(path.display().to_string()));
    }

    let bytes = fs::read(path).await?;
    decode_srt(&bytes, encoding).map_err(|e| match e {
        LegendaError::InvalidDocument(msg) => LegendaError::InvalidDocument(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Decode raw file bytes into normalised SRT text.
pub fn decode_srt(bytes: &[u8], encoding: SubtitleEncoding) -> Result<String> {
    let text = match encoding {
        SubtitleEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| {
            LegendaError::InvalidDocument("not valid UTF-8, try --encoding windows-1252".to_string())
        })?,
        SubtitleEncoding::Windows1252 => WINDOWS_1252.decode(bytes).0.into_owned(),
        SubtitleEncoding::Auto => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                debug!("Input is not valid UTF-8, decoding as Windows-1252");
                WINDOWS_1252.decode(bytes).0.into_owned()
            }
        },
    };

    Ok(normalize_line_endings(text.trim_start_matches(BOM)))
}

/// Write SRT text to disk
pub async fn write_srt_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    info!("Writing SRT file: {}", path.display());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, content).await?;

    Ok(())
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello there.\n\n\
                          2\n00:00:03,000 --> 00:00:04,500\nFirst line\nSecond line";

    #[test]
    fn test_parse_well_formed_document() {
        let blocks = parse(SAMPLE);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].index, 1);
        assert_eq!(blocks[0].timestamp, "00:00:01,000 --> 00:00:02,000");
        assert_eq!(blocks[0].original_text, "Hello there.");
        assert_eq!(blocks[1].original_text, "First line\nSecond line");
        assert!(blocks.iter().all(|b| b.translated_text.is_empty()));
    }

    #[test]
    fn test_parse_tolerates_whitespace_between_blocks() {
        let text = "\n\n1\n00:00:01,000 --> 00:00:02,000\nA\n  \n\t\n2\n00:00:03,000 --> 00:00:04,000\nB\n\n\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].original_text, "B");
    }

    #[test]
    fn test_parse_drops_non_integer_index() {
        assert!(parse("abc\n00:00:01,000 --> 00:00:02,000\nHi").is_empty());
    }

    #[test]
    fn test_parse_drops_blocks_without_body_or_timestamp() {
        let text = "1\n00:00:01,000 --> 00:00:02,000\n\n\
                    2\n\n\
                    3\n00:00:05,000 --> 00:00:06,000\nKept";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, 3);
    }

    #[test]
    fn test_parse_never_fails_on_garbage() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\n  ").is_empty());
        assert!(parse("just some prose\nwith lines").is_empty());
    }

    #[test]
    fn test_round_trip_original() {
        let blocks = vec![
            SubtitleBlock::new(7, "00:01:00,000 --> 00:01:02,000", "Seven"),
            SubtitleBlock::new(8, "00:01:03,000 --> 00:01:05,000", "Eight\n- and a half"),
        ];
        assert_eq!(parse(&serialize_original(&blocks)), blocks);
    }

    #[test]
    fn test_serialize_translated_has_no_trailing_separator() {
        let mut blocks = parse(SAMPLE);
        blocks[0].translated_text = "Olá.".to_string();
        blocks[1].translated_text = "Primeira\nSegunda".to_string();

        let out = serialize_translated(&blocks);
        assert_eq!(
            out,
            "1\n00:00:01,000 --> 00:00:02,000\nOlá.\n\n2\n00:00:03,000 --> 00:00:04,500\nPrimeira\nSegunda"
        );
    }

    #[test]
    fn test_is_valid_srt_checks_first_block_only() {
        assert!(is_valid_srt(SAMPLE));
        assert!(is_valid_srt(&format!("{}\n\ngarbage block", SAMPLE)));
        assert!(is_valid_srt("\u{feff}1\n00:00:01,000 --> 00:00:02,000\nHi"));
        assert!(!is_valid_srt(""));
        assert!(!is_valid_srt("1\n00:00:01 --> 00:00:02\nHi"));
        assert!(!is_valid_srt("1\n00:00:01,000 --> 00:00:02,000\n"));
        assert!(!is_valid_srt("WEBVTT\n\n00:01.000 --> 00:02.000\nHi"));
    }

    #[test]
    fn test_position_index_last_duplicate_wins() {
        let blocks = vec![
            SubtitleBlock::new(1, "t", "a"),
            SubtitleBlock::new(2, "t", "b"),
            SubtitleBlock::new(1, "t", "c"),
        ];
        let positions = position_index(&blocks);
        assert_eq!(positions[&1], 2);
        assert_eq!(positions[&2], 1);
    }

    // "Não, obrigado." as Windows-1252 bytes
    const WESTERN: &[u8] = b"1\r\n00:00:01,000 --> 00:00:02,000\r\nN\xe3o, obrigado.\r\n";

    #[test]
    fn test_decode_western_encoding() {
        let expected = "1\n00:00:01,000 --> 00:00:02,000\nNão, obrigado.\n";
        assert_eq!(decode_srt(WESTERN, SubtitleEncoding::Windows1252).unwrap(), expected);
        assert_eq!(decode_srt(WESTERN, SubtitleEncoding::Auto).unwrap(), expected);
        assert!(matches!(
            decode_srt(WESTERN, SubtitleEncoding::Utf8),
            Err(LegendaError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_auto_prefers_utf8() {
        let text = "1\n00:00:01,000 --> 00:00:02,000\nNão";
        assert_eq!(decode_srt(text.as_bytes(), SubtitleEncoding::Auto).unwrap(), text);
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("UTF8".parse::<SubtitleEncoding>().unwrap(), SubtitleEncoding::Utf8);
        assert_eq!("iso-8859-1".parse::<SubtitleEncoding>().unwrap(), SubtitleEncoding::Windows1252);
        assert!("ebcdic".parse::<SubtitleEncoding>().is_err());
        assert_eq!(SubtitleEncoding::Windows1252.to_string(), "windows-1252");
    }

    #[tokio::test]
    async fn test_read_latin1_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filme.srt");
        std::fs::write(&path, WESTERN).unwrap();

        let text = read_srt_file(&path).await.unwrap();
        assert_eq!(parse(&text)[0].original_text, "Não, obrigado.");

        let strict = read_srt_file_as(&path, SubtitleEncoding::Utf8).await;
        assert!(matches!(strict, Err(LegendaError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_read_srt_file_normalizes_crlf_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.srt");
        std::fs::write(&path, "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n").unwrap();

        let text = read_srt_file(&path).await.unwrap();
        assert_eq!(text, "1\n00:00:01,000 --> 00:00:02,000\nHi\n");

        let missing = read_srt_file(dir.path().join("missing.srt")).await;
        assert!(matches!(missing, Err(LegendaError::FileNotFound(_))));
    }
}
