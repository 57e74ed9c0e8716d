use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{LegendaError, Result};
use crate::subtitle::SubtitleEncoding;

// Default values for configuration fields missing from the file
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_fast_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_target_language() -> String {
    "pt-BR".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    30
}

fn default_batch_delay_ms() -> u64 {
    1000
}

fn default_max_lines() -> usize {
    2
}

fn default_max_chars_per_line() -> usize {
    42
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".legenda")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini `generateContent` API
    Gemini,
    /// Local Ollama server
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Backend used for every translation call
    #[serde(default)]
    pub provider: Provider,
    /// API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used for batch translation
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for single-block calls and context search
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    /// Environment variable holding the API key (ignored by Ollama)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Language the subtitles are translated into
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after the first attempt of a rate-limited call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay, doubled on every further attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of subtitle blocks sent per translation call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between two batches, in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Strip closed-caption artifacts from source text before sending it
    #[serde(default)]
    pub clean_source: bool,
    /// Strip closed-caption artifacts the translator left in its output
    #[serde(default)]
    pub clean_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Maximum number of lines per subtitle block
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Maximum characters per subtitle line
    #[serde(default = "default_max_chars_per_line")]
    pub max_chars_per_line: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Encoding of subtitle files read from disk: auto, utf-8 or windows-1252
    #[serde(default)]
    pub encoding: SubtitleEncoding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the progress snapshot and logs
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            endpoint: default_endpoint(),
            model: default_model(),
            fast_model: default_fast_model(),
            api_key_env: default_api_key_env(),
            target_language: default_target_language(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_ms: default_batch_delay_ms(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            max_chars_per_line: default_max_chars_per_line(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

impl TranslateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            LegendaError::Config(format!(
                "Environment variable {} is not set",
                self.api_key_env
            ))
        })
    }
}

impl BatchConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LegendaError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| LegendaError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LegendaError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| LegendaError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.batch_size == 0 {
            return Err(LegendaError::Config("batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::Gemini
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [translate]
            provider = "ollama"
            endpoint = "http://localhost:11434"
            model = "llama3.2:3b"

            [batch]
            batch_size = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.translate.provider, Provider::Ollama);
        assert_eq!(config.translate.model, "llama3.2:3b");
        assert_eq!(config.translate.target_language, "pt-BR");
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.delay_ms, 1000);
        assert_eq!(config.layout.max_chars_per_line, 42);
        assert!(!config.cleaning.clean_source);
        assert_eq!(config.input.encoding, SubtitleEncoding::Auto);
    }

    #[test]
    fn test_input_encoding_from_file() {
        let config: Config = toml::from_str("[input]\nencoding = \"windows-1252\"\n").unwrap();
        assert_eq!(config.input.encoding, SubtitleEncoding::Windows1252);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.batch.batch_size = 12;
        config.cleaning.clean_output = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.batch.batch_size, 12);
        assert!(loaded.cleaning.clean_output);
        assert_eq!(loaded.translate.provider, Provider::Gemini);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[batch]\nbatch_size = 0\n").unwrap();

        assert!(matches!(Config::from_file(&path), Err(LegendaError::Config(_))));
    }
}
