use crate::config::LayoutConfig;
use crate::context::{ContextKind, MovieContext, SongContext, TranslationContext};

/// Builds the prompts sent to the text-generation backend.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_language: String,
    layout: LayoutConfig,
}

impl PromptBuilder {
    pub fn new(target_language: impl Into<String>, layout: LayoutConfig) -> Self {
        Self {
            target_language: target_language.into(),
            layout,
        }
    }

    pub fn target_language_name(&self) -> String {
        language_code_to_name(&self.target_language)
    }

    /// Prompt for a whole SRT batch
    pub fn batch(&self, srt: &str, context: &TranslationContext, source_language: &str) -> String {
        let source = language_code_to_name(source_language);
        let target = self.target_language_name();

        let mut prompt = match context {
            TranslationContext::Movie(movie) => format!(
                "You are an expert translator and professional subtitler, translating from {source} to {target}.\n\
                 \n\
                 Translate the SRT content below. Use the movie/series context to get tone, characters and \
                 terminology right.\n\
                 \n\
                 --- CONTEXT ---\n\
                 {context}\
                 --- END OF CONTEXT ---\n",
                source = source,
                target = target,
                context = movie_context_block(movie),
            ),
            TranslationContext::Song(song) => format!(
                "You are an expert artistic translator, translating song lyrics from {source} to {target}. \
                 Capture the poetic and emotional essence of the song, not just its literal meaning.\n\
                 \n\
                 Adapt metaphors and idioms to natural equivalents, keep the artist's tone and make the \
                 lyrics flow like a song.\n\
                 \n\
                 --- SONG CONTEXT ---\n\
                 {context}\
                 --- END OF CONTEXT ---\n",
                source = source,
                target = target,
                context = song_context_block(song),
            ),
        };

        prompt.push_str(&format!(
            "\n\
             RULES:\n\
             1. DO NOT CHANGE INDICES OR TIMESTAMPS: index lines (e.g. '1') and timestamp lines \
             (e.g. '00:00:20,007 --> 00:00:22,007') must stay exactly as they are.\n\
             2. {layout}\n\
             3. The translation must sound natural to a native {target} speaker and follow its punctuation \
             rules. Keep terms and tone consistent across the file.\n\
             4. OUTPUT: reply with ONLY the translated SRT content. No explanations, no code fences.\n\
             \n\
             --- SRT CONTENT START ---\n\
             {srt}\n\
             --- SRT CONTENT END ---\n",
            layout = self.layout_rules(),
            target = target,
            srt = srt,
        ));

        prompt
    }

    /// Prompt for a single block's text, returned without SRT framing
    pub fn single_block(&self, text: &str, context: &TranslationContext, source_language: &str) -> String {
        format!(
            "Translate the following subtitle text from {source} to {target}.\n\
             It belongs to the {kind} \"{title}\".\n\
             {layout}\n\
             Reply with ONLY the translated text, without introductions, explanations or code fences.\n\
             \n\
             --- TEXT TO TRANSLATE ---\n\
             {text}\n\
             --- END OF TEXT ---\n",
            source = language_code_to_name(source_language),
            target = self.target_language_name(),
            kind = context.kind(),
            title = context,
            layout = self.layout_rules(),
            text = text,
        )
    }

    /// Prompt that re-wraps already translated text without translating it
    pub fn reformat(&self, text: &str, context: &TranslationContext) -> String {
        format!(
            "You are a professional subtitler working on the {kind} \"{title}\".\n\
             Re-wrap the {target} subtitle text below so it follows these rules, without translating it \
             and changing as few words as possible:\n\
             {layout}\n\
             Reply with ONLY the reformatted text.\n\
             \n\
             --- TEXT ---\n\
             {text}\n\
             --- END OF TEXT ---\n",
            kind = context.kind(),
            title = context,
            target = self.target_language_name(),
            layout = self.layout_rules(),
            text = text,
        )
    }

    /// Prompt asking for up to five structured context candidates as JSON
    pub fn search(&self, query: &str, kind: ContextKind) -> String {
        match kind {
            ContextKind::Movie => format!(
                "Find movies or TV series matching the search query '{}'. Check IMDb and The Movie Database \
                 (TMDb), compare both and return a JSON array with up to 5 of the most relevant results. \
                 Each result is an object with the string fields: title, year, description (full plot \
                 synopsis), director, genre. Return an empty array if nothing matches. Reply with JSON only.",
                query
            ),
            ContextKind::Music => format!(
                "Find songs matching the search query '{}'. Check Genius, Wikipedia, MusicBrainz and \
                 Spotify/Apple Music and return a JSON array with up to 5 of the most relevant results. \
                 Each result is an object with the string fields: title, artist, album, year, genre, \
                 meaning (a short summary of the lyrical theme). Return an empty array if nothing matches. \
                 Reply with JSON only.",
                query
            ),
        }
    }

    fn layout_rules(&self) -> String {
        format!(
            "SUBTITLE LAYOUT: at most {} characters per line and at most {} lines per block. Break long \
             sentences where it makes grammatical sense (after a comma, before a conjunction).",
            self.layout.max_chars_per_line, self.layout.max_lines
        )
    }
}

fn movie_context_block(movie: &MovieContext) -> String {
    format!(
        "* Title: {}\n* Year: {}\n* Genre: {}\n* Director: {}\n* Synopsis: {}\n",
        or_unknown(&movie.title, "Unknown title"),
        or_unknown(&movie.year, "Unknown year"),
        or_unknown(&movie.genre, "Unknown genre"),
        or_unknown(&movie.director, "Unknown director"),
        or_unknown(&movie.description, "No synopsis provided."),
    )
}

fn song_context_block(song: &SongContext) -> String {
    format!(
        "* Song title: {}\n* Artist: {}\n* Album: {}\n* Year: {}\n* Genre: {}\n* Meaning: {}\n",
        or_unknown(&song.title, "Unknown title"),
        or_unknown(&song.artist, "Unknown artist"),
        or_unknown(&song.album, "Unknown album"),
        or_unknown(&song.year, "Unknown year"),
        or_unknown(&song.genre, "Unknown genre"),
        or_unknown(&song.meaning, "No meaning provided."),
    )
}

fn or_unknown<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

/// Convert a language code to its English name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "pt-br" => "Brazilian Portuguese".to_string(),
        "pt" | "pt-pt" => "European Portuguese".to_string(),
        "en" | "en-us" | "en-gb" => "English".to_string(),
        "es" | "es-es" | "es-419" => "Spanish".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "it" => "Italian".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" => "Chinese".to_string(),
        "ru" => "Russian".to_string(),
        "pl" => "Polish".to_string(),
        "nl" => "Dutch".to_string(),
        "tr" => "Turkish".to_string(),
        "ar" => "Arabic".to_string(),
        "hi" => "Hindi".to_string(),
        "sv" => "Swedish".to_string(),
        "da" => "Danish".to_string(),
        "no" => "Norwegian".to_string(),
        "fi" => "Finnish".to_string(),
        "uk" => "Ukrainian".to_string(),
        "ca" => "Catalan".to_string(),
        "gl" => "Galician".to_string(),
        _ => code.to_string(), // Fallback to the code itself if not found
    }
}
