//! TOML configuration.
//!
//! Every section carries serde defaults, so an empty file (or no file at all,
//! see [`load_or_default`]) yields a working configuration: local SQLite and
//! JSON storage under `user_data/`, local embeddings, and the offline
//! generation provider unless a Gemini credential is supplied.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `generation.api_key` is not set.
pub const CREDENTIAL_ENV: &str = "GEMINI_API_KEY";

/// Smallest window a session may choose.
pub const MIN_SEGMENT_SIZE: usize = 500;
/// Largest window a session may choose.
pub const MAX_SEGMENT_SIZE: usize = 3000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("user_data/users.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_context_path")]
    pub path: PathBuf,
    /// More than this many "explain" questions in history adds the
    /// simple-clarity note to the adaptive instruction.
    #[serde(default = "default_explain_threshold")]
    pub explain_threshold: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            path: default_context_path(),
            explain_threshold: default_explain_threshold(),
        }
    }
}

fn default_context_path() -> PathBuf {
    PathBuf::from("user_data/user_context.json")
}
fn default_explain_threshold() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in characters.
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,
    /// Characters shared by consecutive windows of the same page.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            segment_size: default_segment_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_segment_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Segments retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout; `None` leaves the HTTP client default in place.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_generation_base_url(),
            api_key: None,
            timeout_secs: None,
        }
    }
}

fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_generation_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

impl GenerationConfig {
    /// Credential from the config file, falling back to [`CREDENTIAL_ENV`].
    pub fn credential(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(CREDENTIAL_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    #[serde(default = "default_readability_sample")]
    pub readability_sample: usize,
    #[serde(default = "default_keyword_sample")]
    pub keyword_sample: usize,
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
    #[serde(default)]
    pub bands: ReadabilityBands,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            readability_sample: default_readability_sample(),
            keyword_sample: default_keyword_sample(),
            keyword_limit: default_keyword_limit(),
            bands: ReadabilityBands::default(),
        }
    }
}

fn default_readability_sample() -> usize {
    20
}
fn default_keyword_sample() -> usize {
    50
}
fn default_keyword_limit() -> usize {
    10
}

/// Lower bounds (exclusive) of the reading-ease labels.
#[derive(Debug, Deserialize, Clone)]
pub struct ReadabilityBands {
    #[serde(default = "default_very_easy")]
    pub very_easy: f64,
    #[serde(default = "default_standard")]
    pub standard: f64,
    #[serde(default = "default_college")]
    pub college: f64,
}

impl Default for ReadabilityBands {
    fn default() -> Self {
        Self {
            very_easy: default_very_easy(),
            standard: default_standard(),
            college: default_college(),
        }
    }
}

fn default_very_easy() -> f64 {
    90.0
}
fn default_standard() -> f64 {
    60.0
}
fn default_college() -> f64 {
    30.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted PDF upload, in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_max_upload_mb() -> usize {
    200
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file means "all defaults".
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if !(MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&chunking.segment_size) {
        anyhow::bail!(
            "chunking.segment_size must be between {} and {}",
            MIN_SEGMENT_SIZE,
            MAX_SEGMENT_SIZE
        );
    }
    // Must fit every window size a session can choose.
    if chunking.overlap >= MIN_SEGMENT_SIZE {
        anyhow::bail!(
            "chunking.overlap must be smaller than {} (the smallest segment size)",
            MIN_SEGMENT_SIZE
        );
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    let bands = &config.analytics.bands;
    if !(bands.very_easy > bands.standard && bands.standard > bands.college) {
        anyhow::bail!("analytics.bands must be strictly decreasing: very_easy > standard > college");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, or ollama.",
            other
        ),
    }
    if config.embedding.provider == "ollama" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'ollama'");
    }

    Ok(())
}
