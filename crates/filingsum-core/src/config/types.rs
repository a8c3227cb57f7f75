//! Configuration type definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::inference::Backend;
use crate::pipeline::{FailurePolicy, Strategy};
use crate::summarizer::SummaryFocus;

/// Minimum pause between EDGAR requests (SEC fair-access rule)
pub const MIN_REQUEST_DELAY_MS: u64 = 100;

/// Resolved filingsum configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub edgar: EdgarConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Directories for downloaded filings, progress records and summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for raw filings, caches and progress records
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Where summary artifacts are written (defaults to `<data_dir>/summaries`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

/// SEC EDGAR access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgarConfig {
    /// User-Agent sent to EDGAR; SEC requires a contact e-mail address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_tickers_url")]
    pub tickers_url: String,

    #[serde(default = "default_submissions_url")]
    pub submissions_url: String,

    #[serde(default = "default_archives_url")]
    pub archives_url: String,
}

/// Language model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Ollama server URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model_name")]
    pub name: String,

    /// Program and arguments for the `command` backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token budget for one chunk summary
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: u32,

    /// Output token budget for the final synthesis
    #[serde(default = "default_reduce_max_tokens")]
    pub reduce_max_tokens: u32,

    /// Abandon a single inference call after this many seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Chunking and orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Extra attempts per chunk before the failure policy applies
    #[serde(default)]
    pub max_retries: u32,

    /// Worker threads for the parallel strategy
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub focus: SummaryFocus,

    /// Keep the progress record after a successful run
    #[serde(default = "default_keep_progress")]
    pub keep_progress: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: None,
        }
    }
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_delay_ms: default_request_delay_ms(),
            tickers_url: default_tickers_url(),
            submissions_url: default_submissions_url(),
            archives_url: default_archives_url(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: default_base_url(),
            name: default_model_name(),
            command: Vec::new(),
            temperature: default_temperature(),
            chunk_max_tokens: default_chunk_max_tokens(),
            reduce_max_tokens: default_reduce_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            strategy: Strategy::default(),
            failure_policy: FailurePolicy::default(),
            max_retries: 0,
            workers: default_workers(),
            focus: SummaryFocus::default(),
            keep_progress: default_keep_progress(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("filingsum"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn default_request_delay_ms() -> u64 {
    MIN_REQUEST_DELAY_MS
}

fn default_tickers_url() -> String {
    "https://www.sec.gov/files/company_tickers.json".to_string()
}

fn default_submissions_url() -> String {
    "https://data.sec.gov/submissions".to_string()
}

fn default_archives_url() -> String {
    "https://www.sec.gov/Archives/edgar/data".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model_name() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_chunk_max_tokens() -> u32 {
    1000
}

fn default_reduce_max_tokens() -> u32 {
    2000
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_chunk_size() -> usize {
    12_000
}

fn default_overlap() -> usize {
    1_200
}

fn default_workers() -> usize {
    3
}

fn default_keep_progress() -> bool {
    true
}
