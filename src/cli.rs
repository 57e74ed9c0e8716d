use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate an SRT file in batches
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: <name>_<target>.srt next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Context kind: movie or music
        #[arg(short, long, default_value = "movie")]
        kind: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        director: Option<String>,

        #[arg(long)]
        genre: Option<String>,

        /// Plot or scene description
        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        artist: Option<String>,

        #[arg(long)]
        album: Option<String>,

        /// What the song is about
        #[arg(long)]
        meaning: Option<String>,

        /// Look up the context online before translating
        #[arg(long)]
        search: Option<String>,

        /// Language of the input subtitles
        #[arg(long, default_value = "en")]
        source_lang: String,

        /// Blocks per request (overrides the config file)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Only translate this many blocks now
        #[arg(long)]
        limit: Option<usize>,

        /// Input encoding: auto, utf-8 or windows-1252
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Continue the saved translation
    Resume {
        /// Output file (default: <name>_<target>.srt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only translate this many blocks now
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the saved session and layout warnings
    Status,

    /// Replace the translation of one block
    Edit {
        #[arg(short, long)]
        index: u32,

        #[arg(short, long)]
        text: String,
    },

    /// Translate one block again
    Retranslate {
        #[arg(short, long)]
        index: u32,
    },

    /// Re-wrap one translated block to the layout limits
    Reformat {
        #[arg(short, long)]
        index: u32,
    },

    /// Write the translated subtitles of the saved session
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Discard the saved session
    Reset,

    /// Strip closed-caption artifacts from a file or a directory of SRT files
    Clean {
        /// SRT file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output file, or output directory when cleaning a directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input encoding: auto, utf-8 or windows-1252
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Report blocks that break the layout limits
    Check {
        #[arg(short, long)]
        input: PathBuf,

        /// Input encoding: auto, utf-8 or windows-1252
        #[arg(long)]
        encoding: Option<String>,
    },

    /// Search movie or song metadata
    Search {
        #[arg(short, long)]
        query: String,

        #[arg(short, long, default_value = "movie")]
        kind: String,
    },
}
