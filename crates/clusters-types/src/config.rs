//! Configuration loading for topic-clusters.
//!
//! Layered config: defaults -> config file -> CLI config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/topic-clusters/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ClustersError;

/// Policy choosing the number of k-means clusters for `n` inputs.
///
/// Every policy is monotonically non-decreasing in `n`, never exceeds `n`,
/// and yields at least 2 clusters once there are 2 or more inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClusterCountPolicy {
    /// `max(2, n / 3)`
    #[default]
    Linear,
    /// `max(2, ceil(log2 n))`
    Logarithmic,
}

impl ClusterCountPolicy {
    pub fn cluster_count(&self, n: usize) -> usize {
        if n <= 1 {
            return n;
        }
        let k = match self {
            ClusterCountPolicy::Linear => n / 3,
            ClusterCountPolicy::Logarithmic => (usize::BITS - (n - 1).leading_zeros()) as usize,
        };
        k.max(2).min(n)
    }
}

/// Cluster title generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingConfig {
    /// Ask the LLM for a title first
    #[serde(default = "default_true")]
    pub use_llm: bool,

    /// Match clusters against the built-in candidate topic list
    #[serde(default = "default_true")]
    pub use_candidates: bool,

    /// Minimum cosine similarity for a candidate topic to be accepted
    #[serde(default = "default_candidate_threshold")]
    pub candidate_threshold: f32,

    /// Number of member texts shown to the LLM
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Per-sample character limit in the LLM prompt
    #[serde(default = "default_max_sample_chars")]
    pub max_sample_chars: usize,

    /// Per-strategy timeout in milliseconds
    #[serde(default = "default_title_timeout_ms")]
    pub timeout_ms: u64,

    /// Title used when every strategy declines
    #[serde(default = "default_title")]
    pub default_title: String,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            use_llm: default_true(),
            use_candidates: default_true(),
            candidate_threshold: default_candidate_threshold(),
            max_samples: default_max_samples(),
            max_sample_chars: default_max_sample_chars(),
            timeout_ms: default_title_timeout_ms(),
            default_title: default_title(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_candidate_threshold() -> f32 {
    0.3
}
fn default_max_samples() -> usize {
    5
}
fn default_max_sample_chars() -> usize {
    200
}
fn default_title_timeout_ms() -> u64 {
    10_000
}
fn default_title() -> String {
    "General Topics".to_string()
}

/// Per-category summary settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SummaryConfig {
    /// Disabled by default
    #[serde(default)]
    pub enabled: bool,
}

/// Clustering engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cluster_count: ClusterCountPolicy,

    /// Seed for k-means++ initialization
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Upper bound on k-means refinement passes
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Timeout for the embedding step in seconds
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    #[serde(default)]
    pub labeling: LabelingConfig,

    #[serde(default)]
    pub summaries: SummaryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_count: ClusterCountPolicy::default(),
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            embed_timeout_secs: default_embed_timeout_secs(),
            labeling: LabelingConfig::default(),
            summaries: SummaryConfig::default(),
        }
    }
}

fn default_seed() -> u64 {
    42
}
fn default_max_iterations() -> usize {
    100
}
fn default_embed_timeout_secs() -> u64 {
    120
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local all-MiniLM-L6-v2 via Candle
    #[default]
    Candle,
    /// Deterministic feature hashing, no model download
    Hashing,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// HuggingFace repository for the Candle model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Model cache directory (defaults to the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Vector dimension for the hashing backend
    #[serde(default = "default_hashing_dimension")]
    pub hashing_dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model_repo: default_model_repo(),
            cache_dir: None,
            hashing_dimension: default_hashing_dimension(),
        }
    }
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_hashing_dimension() -> usize {
    256
}

/// LLM provider settings used for titles and summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// API key (load from env var, not the config file). No key disables the LLM.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_max_retries(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_llm_max_retries() -> u32 {
    2
}

/// Sweep scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Run the recurring sweep job
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 6-field cron expression (sec min hour day month weekday)
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,

    /// IANA timezone for the cron schedule
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Grace period for in-flight jobs on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sweep_cron: default_sweep_cron(),
            timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_sweep_cron() -> String {
    "*/10 * * * * *".to_string() // every 10 seconds
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_shutdown_timeout() -> u64 {
    30
}

/// Downstream forwarding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardSettings {
    /// Endpoint receiving settled results. None disables forwarding.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_forward_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_forward_timeout_ms(),
        }
    }
}

fn default_forward_timeout_ms() -> u64 {
    2000
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub forward: ForwardSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "topic-clusters")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            http_port: default_http_port(),
            http_host: default_http_host(),
            log_level: default_log_level(),
            engine: EngineConfig::default(),
            embedding: EmbeddingSettings::default(),
            llm: LlmSettings::default(),
            scheduler: SchedulerSettings::default(),
            forward: ForwardSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/topic-clusters/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CLUSTERS_*, nested keys joined with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ClustersError> {
        let config_dir = ProjectDirs::from("", "", "topic-clusters")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| ClustersError::Config(e.to_string()))?
            .set_default("http_port", default_http_port() as i64)
            .map_err(|e| ClustersError::Config(e.to_string()))?
            .set_default("http_host", default_http_host())
            .map_err(|e| ClustersError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ClustersError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CLUSTERS_HTTP_PORT, CLUSTERS_LLM__API_KEY, CLUSTERS_SCHEDULER__SWEEP_CRON, ...
        builder = builder.add_source(
            Environment::with_prefix("CLUSTERS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| ClustersError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ClustersError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ClustersError> {
        if self.http_port == 0 {
            return Err(ClustersError::Config("http_port must be > 0".to_string()));
        }
        if self.scheduler.sweep_cron.trim().is_empty() {
            return Err(ClustersError::Config(
                "scheduler.sweep_cron must not be empty".to_string(),
            ));
        }
        let threshold = self.engine.labeling.candidate_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ClustersError::Config(format!(
                "engine.labeling.candidate_threshold must be 0.0-1.0, got {}",
                threshold
            )));
        }
        if self.engine.labeling.max_samples == 0 {
            return Err(ClustersError::Config(
                "engine.labeling.max_samples must be > 0".to_string(),
            ));
        }
        if self.engine.max_iterations == 0 {
            return Err(ClustersError::Config(
                "engine.max_iterations must be > 0".to_string(),
            ));
        }
        if self.embedding.hashing_dimension == 0 {
            return Err(ClustersError::Config(
                "embedding.hashing_dimension must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the socket address for the HTTP server
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
