//! Configuration loading and resolution
//!
//! Two layers, both optional:
//! 1. **TOML bootstrap**: checkpoint database path, output folder, logging and
//!    the pipeline tuning table (`[pipeline]`)
//! 2. **Compiled defaults**: every field has a built-in default, so a missing
//!    file never stops the pipeline
//!
//! # Config File Priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`INSIGHT_CONFIG`)
//! 3. Platform config dir (`~/.config/insight/config.toml` on Linux)
//! 4. Compiled defaults
//!
//! `INSIGHT_API_KEY` overrides `pipeline.analysis.api_key` regardless of source.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "INSIGHT_CONFIG";

/// Environment variable carrying the analysis endpoint API key
pub const API_KEY_ENV_VAR: &str = "INSIGHT_API_KEY";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// SQLite file holding checkpoints (None = in-memory store)
    pub checkpoint_db: Option<PathBuf>,

    /// Folder for rendered reports
    pub output_dir: Option<PathBuf>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Pipeline tuning
    pub pipeline: PipelineSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given on the command line
    CommandLine(PathBuf),
    /// Path named by `INSIGHT_CONFIG`
    Environment(PathBuf),
    /// Platform default config file
    PlatformDefault(PathBuf),
    /// No file found; compiled defaults
    CompiledDefaults,
}

// ============================================================================
// Pipeline Settings
// ============================================================================

/// Tuning for every pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Bounded worker pool size for fan-out stages
    pub workers: usize,
    pub retry: RetrySettings,
    pub analysis: AnalysisSettings,
    /// Controlled tag vocabulary
    pub vocabulary: Vec<String>,
    pub frequency: FrequencySettings,
    pub cooccurrence: CooccurrenceSettings,
    pub contradiction: ContradictionSettings,
    pub clustering: ClusteringSettings,
    pub synthesis: SynthesisSettings,
    pub validation: ValidationSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            retry: RetrySettings::default(),
            analysis: AnalysisSettings::default(),
            vocabulary: default_vocabulary(),
            frequency: FrequencySettings::default(),
            cooccurrence: CooccurrenceSettings::default(),
            contradiction: ContradictionSettings::default(),
            clustering: ClusteringSettings::default(),
            synthesis: SynthesisSettings::default(),
            validation: ValidationSettings::default(),
        }
    }
}

/// Default controlled vocabulary (rule-based analyzer taxonomy)
pub fn default_vocabulary() -> Vec<String> {
    [
        "psychology",
        "risk-management",
        "technical-analysis",
        "fundamental-analysis",
        "post-mortem",
        "strategy",
        "discipline",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Timeout and retry policy for external capability calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Per-attempt timeout
    pub call_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            call_timeout_ms: 30_000,
        }
    }
}

/// Analysis capability selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisProvider {
    /// Offline keyword heuristics
    RuleBased,
    /// JSON endpoint (language-model backed)
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisSettings {
    pub provider: AnalysisProvider,
    /// Endpoint URL for the HTTP provider
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    /// Degrade to the rule-based analyzer when the primary exhausts its retries
    pub fallback_to_rules: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::RuleBased,
            endpoint: None,
            model: "default".to_string(),
            api_key: None,
            fallback_to_rules: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrequencySettings {
    /// Document count at which a concept becomes notable
    pub notable_min: usize,
    /// Corpus share at which a notable concept becomes a core belief
    pub core_belief_ratio: f64,
}

impl Default for FrequencySettings {
    fn default() -> Self {
        Self {
            notable_min: 3,
            core_belief_ratio: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CooccurrenceSettings {
    /// Minimum `count_ab / min(count_a, count_b)`
    pub min_rate: f64,
    /// Minimum number of documents holding both concepts
    pub min_pair_count: usize,
}

impl Default for CooccurrenceSettings {
    fn default() -> Self {
        Self {
            min_rate: 0.5,
            min_pair_count: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContradictionSettings {
    /// Normalized Levenshtein similarity at which two rule actions match
    pub match_threshold: f64,
}

impl Default for ContradictionSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusteringSettings {
    /// Fixed cluster count; None derives it from `merge_threshold`
    pub target_clusters: Option<usize>,
    /// Stop merging when mean intra-cluster similarity would fall below this
    pub merge_threshold: f64,
    /// Minimum theme membership (never below 3)
    pub min_members: usize,
    pub tag_weight: f64,
    pub affinity_weight: f64,
    pub max_key_concepts: usize,
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            target_clusters: None,
            merge_threshold: 0.5,
            min_members: 3,
            tag_weight: 0.7,
            affinity_weight: 0.3,
            max_key_concepts: 5,
        }
    }
}

/// Time bucket size for evolution tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    Month,
    Quarter,
    Year,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Minimum principle confidence
    pub principle_confidence: f64,
    /// Stance magnitude that counts as a position
    pub stance_threshold: f64,
    pub period: PeriodGranularity,
    /// Member count at which a contradiction-free chapter is suspicious
    pub suspicious_member_count: usize,
    pub max_rules: usize,
    pub max_quotes: usize,
    /// Gap between two positions that counts as time evolution
    pub min_resolution_gap_days: i64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            principle_confidence: 0.6,
            stance_threshold: 0.5,
            period: PeriodGranularity::Month,
            suspicious_member_count: 10,
            max_rules: 10,
            max_quotes: 5,
            min_resolution_gap_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationSettings {
    /// Member count at which zero contradictions is an auto-reject
    pub large_theme: usize,
    /// Period count at which a monotonic timeline is an auto-reject
    pub monotonic_periods: usize,
    /// Evidence documents a principle needs to pass
    pub min_evidence: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            large_theme: 10,
            monotonic_periods: 4,
            min_evidence: 2,
        }
    }
}

impl PipelineSettings {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("pipeline.workers must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "pipeline.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.call_timeout_ms == 0 {
            return Err(Error::Config(
                "pipeline.retry.call_timeout_ms must be positive".to_string(),
            ));
        }

        let ratios = [
            ("frequency.core_belief_ratio", self.frequency.core_belief_ratio),
            ("cooccurrence.min_rate", self.cooccurrence.min_rate),
            ("contradiction.match_threshold", self.contradiction.match_threshold),
            ("clustering.merge_threshold", self.clustering.merge_threshold),
            ("clustering.tag_weight", self.clustering.tag_weight),
            ("clustering.affinity_weight", self.clustering.affinity_weight),
            ("synthesis.principle_confidence", self.synthesis.principle_confidence),
            ("synthesis.stance_threshold", self.synthesis.stance_threshold),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "pipeline.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.clustering.target_clusters == Some(0) {
            return Err(Error::Config(
                "pipeline.clustering.target_clusters must be at least 1".to_string(),
            ));
        }
        if self.analysis.provider == AnalysisProvider::Http && self.analysis.endpoint.is_none() {
            return Err(Error::Config(
                "pipeline.analysis.endpoint is required for the http provider".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Resolve which config file to read
///
/// Returns `CompiledDefaults` when no candidate file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config dir
    if let Some(path) = default_config_path() {
        if path.exists() {
            return ConfigSource::PlatformDefault(path);
        }
    }

    ConfigSource::CompiledDefaults
}

/// Platform config file location (`<config_dir>/insight/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("insight").join("config.toml"))
}

/// Load configuration following the priority order
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// does not parse, or settings that fail validation, are errors.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let source = resolve_config_path(cli_arg);

    let mut config = match &source {
        ConfigSource::CommandLine(path)
        | ConfigSource::Environment(path)
        | ConfigSource::PlatformDefault(path) => {
            if path.exists() {
                let config = read_toml_config(path)?;
                info!("Configuration loaded from {}", path.display());
                config
            } else {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                TomlConfig::default()
            }
        }
        ConfigSource::CompiledDefaults => {
            info!("No config file found, using compiled defaults");
            TomlConfig::default()
        }
    };

    if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
        if !key.trim().is_empty() {
            config.pipeline.analysis.api_key = Some(key);
        }
    }

    config.pipeline.validate()?;
    Ok((config, source))
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
