//! Closed-caption cleanup.
//!
//! Broadcast caption files carry speaker labels, sound cues, music symbols
//! and bare interjections that should not be translated. Every rule below
//! targets one of those conventions and errs on the side of keeping text:
//! dropping real dialogue is worse than leaving a stray cue behind.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Words and phrases that mark a bracketed cue or an all-caps line as non-dialogue.
pub const CC_KEYWORDS: &[&str] = &[
    // Sounds & actions
    "MUSIC", "SONG", "LAUGHING", "LAUGHTER", "CHEERING", "CHANTING",
    "APPLAUSE", "CROWD", "AUDIENCE", "GASPS", "SCREAMING", "FOOTSTEPS",
    "THUNDER", "EXPLOSION", "DOOR", "PHONE RINGING", "SIREN", "ENGINE",
    "WIND", "RAIN", "BANG", "SILENCE", "BEAT", "PAUSE", "SIGH", "CHUCKLES",
    "SCOFFS", "GROANS", "WHIMPERS", "CRYING", "SOBBING", "CLEARS THROAT",
    "GRUNTS", "BREATHING", "PANTING", "BARKING", "MEOWING", "BIRDS",
    "INHALES", "EXHALES", "SIGHS", "SNIFFLES", "COUGHS", "INSTRUMENTAL",
    "THEME", "BACKGROUND", "MÚSICA", "MÚSICA AO FUNDO", "THEME MUSIC", "BACKGROUND MUSIC",
    // Audio source
    "ON RADIO", "OVER PHONE", "ON TV", "OVER PA", "ON INTERCOM",
    // Tone
    "WHISPERING", "SHOUTING", "SOFTLY", "ANGRILY", "SARCASTIC", "UNDER BREATH",
    "LOUDLY", "QUIETLY",
    // Language / meta
    "IN ENGLISH", "IN SPANISH", "SPEAKING FRENCH", "NO DIALOGUE",
    "UNINTELLIGIBLE", "INAUDIBLE", "THINKING",
    // "MUSIC CONTINUES", "APPLAUSE CONTINUES", ...
    "CONTINUES",
    // Technical
    "O.S.", "V.O.", "OFF SCREEN", "VOICE OVER",
];

/// Bracket contents removed on an exact (case-insensitive) match.
const CUE_WHITELIST: &[&str] = &["O.S.", "V.O.", "O.S", "V.O", "ALL", "EVERYONE", "BOTH", "CROWD"];

/// Interjections that carry no meaning when they make up a whole line.
const VOCALIZATIONS: &[&str] = &[
    "OH", "AH", "UH", "UM", "MM", "MMM", "HMM", "HUH", "HA", "HEH", "EH", "OW", "HEY",
];

/// Words that make an all-caps line look like shouted dialogue.
const DIALOGUE_MARKERS: &[&str] = &[
    "I", "YOU", "HE", "SHE", "WE", "THEY", "IT", "ME", "MY", "YOUR", "HIS", "HER", "OUR",
    "THEIR", "WHO", "WHAT", "WHERE", "WHEN", "WHY", "HOW", "YES", "NO", "OK", "HEY", "OH",
    "WELL",
];

const SPEAKER_LABEL_MAX_LEN: usize = 30;
const SPEAKER_CAPS_RATIO: f64 = 0.6;
const CUE_CAPS_RATIO: f64 = 0.7;
const LINE_CAPS_RATIO: f64 = 0.8;

static CONTINUATION_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^>+\s*").unwrap());
static SPEAKER_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z0-9\s\.\-\(\)]+):(\s+|$)").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\[][^\)\]]*[\)\]]").unwrap());
static MUSIC_NOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[♪♫]").unwrap());
static ASTERISKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*.*?\*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static ONLY_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-—]+$").unwrap());
static ONLY_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\.{2,}$").unwrap());

/// Clean a block of text line by line, dropping lines that held only
/// caption artifacts. Surviving lines keep their order.
pub fn clean_text(text: &str) -> String {
    text.split('\n')
        .filter_map(clean_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clean one line. `None` means the line should be deleted entirely.
pub fn clean_line(line: &str) -> Option<String> {
    // After the first pass every change makes the line shorter, so it
    // settles within one pass per byte.
    let mut current = line.to_string();
    for _ in 0..=line.len() {
        let next = clean_line_once(&current)?;
        if next == current {
            break;
        }
        current = next;
    }
    Some(current)
}

fn clean_line_once(line: &str) -> Option<String> {
    let cleaned = line.trim();
    let cleaned = CONTINUATION_MARKER.replace(cleaned, "");
    let cleaned = strip_speaker_label(&cleaned);

    let cleaned = BRACKETED.replace_all(&cleaned, |caps: &Captures| {
        let cue = &caps[0];
        if is_caption_cue(&cue[1..cue.len() - 1]) {
            String::new()
        } else {
            cue.to_string()
        }
    });

    let cleaned = MUSIC_NOTES.replace_all(&cleaned, "");
    let cleaned = ASTERISKS.replace_all(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if ONLY_DASHES.is_match(cleaned) || ONLY_DOTS.is_match(cleaned) || cleaned.is_empty() {
        return None;
    }

    if is_vocalization_only(cleaned) || is_all_caps_cue(cleaned) {
        return None;
    }

    Some(cleaned.to_string())
}

/// Remove a leading `NAME:` label when it looks like a speaker tag.
fn strip_speaker_label(line: &str) -> String {
    if let Some(m) = SPEAKER_LABEL.captures(line) {
        let label = &m[1];
        let letters = count_letters(label);
        let mostly_caps = letters > 0 && caps_ratio(label) > SPEAKER_CAPS_RATIO;
        let short = label.chars().count() < SPEAKER_LABEL_MAX_LEN;

        if (mostly_caps || letters == 0) && short {
            return line[m[0].len()..].to_string();
        }
    }
    line.to_string()
}

/// Decide whether the inside of a `(...)` or `[...]` group is a caption cue.
fn is_caption_cue(inner: &str) -> bool {
    let content = inner.trim();

    if !content.chars().any(|c| c.is_ascii_alphanumeric()) {
        return true;
    }

    let upper = content.to_uppercase();
    if CUE_WHITELIST.contains(&upper.as_str()) {
        return true;
    }
    if CC_KEYWORDS.iter().any(|kw| upper.contains(kw)) {
        return true;
    }
    if count_letters(content) > 0 && caps_ratio(content) > CUE_CAPS_RATIO {
        return true;
    }
    if content.contains('♪') || content.contains('♫') {
        return true;
    }

    content.starts_with('-')
}

fn is_vocalization_only(line: &str) -> bool {
    let stripped: String = line
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let mut words = stripped.split_whitespace().peekable();
    words.peek().is_some() && words.all(|w| VOCALIZATIONS.contains(&w))
}

/// Shouted lines without dialogue markers that name a caption keyword.
fn is_all_caps_cue(line: &str) -> bool {
    if count_letters(line) == 0 || caps_ratio(line) <= LINE_CAPS_RATIO {
        return false;
    }

    let upper = line.to_uppercase();
    let words: Vec<&str> = upper
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| DIALOGUE_MARKERS.contains(w)) {
        return false;
    }
    words.iter().any(|w| CC_KEYWORDS.contains(w))
}

fn count_letters(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_alphabetic()).count()
}

// Share of ASCII letters that are uppercase. Callers check for letters first.
fn caps_ratio(text: &str) -> f64 {
    let caps = text.chars().filter(|c| c.is_ascii_uppercase()).count();
    caps as f64 / count_letters(text) as f64
}
