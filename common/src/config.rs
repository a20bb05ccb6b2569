use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How frames are pulled from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Long-lived HTTP multipart MJPEG stream.
    Mjpeg,
    /// One HTTP request per still frame.
    Polling,
    /// Image files read from a local directory, in name order.
    Directory,
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mjpeg" => Ok(Self::Mjpeg),
            "polling" => Ok(Self::Polling),
            "directory" => Ok(Self::Directory),
            other => Err(format!(
                "unknown source mode '{other}', expected 'mjpeg', 'polling' or 'directory'"
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Stream URL, still-frame URL or directory path depending on `mode`.
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_mode")]
    pub mode: SourceMode,
    /// Request rate for the polling source.
    #[serde(default = "default_poll_fps")]
    pub poll_fps: f64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            mode: default_mode(),
            poll_fps: default_poll_fps(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Base directory the bucket directories are created under.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    /// When false only the `valid` bucket is written.
    #[serde(default = "default_persist_rejected")]
    pub persist_rejected: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            persist_rejected: default_persist_rejected(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Static limits for the frame-quality tests. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct QualityThresholds {
    /// Minimum time between classified samples. Zero or negative samples
    /// every captured frame.
    #[serde(default = "default_interval")]
    pub interval_secs: f64,
    /// Mean luminance below this is too dark.
    #[serde(default = "default_darkness")]
    pub darkness: f64,
    /// Laplacian variance below this is blurry.
    #[serde(default = "default_blur")]
    pub blur: f64,
    /// Mean absolute difference from the last accepted frame below this is
    /// a near-duplicate.
    #[serde(default = "default_similarity")]
    pub similarity: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            darkness: default_darkness(),
            blur: default_blur(),
            similarity: default_similarity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Consecutive capture failures tolerated before the run stops.
    /// Zero retries forever.
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            max_consecutive_failures: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject values the pipeline cannot run with. Called after CLI
    /// overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("thresholds.interval_secs", t.interval_secs),
            ("thresholds.darkness", t.darkness),
            ("thresholds.blur", t.blur),
            ("thresholds.similarity", t.similarity),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be finite, got {value}")));
            }
        }
        if self.source.url.trim().is_empty() {
            return Err(ConfigError::Invalid("source.url must not be empty".into()));
        }
        if self.source.mode == SourceMode::Polling
            && !(self.source.poll_fps.is_finite() && self.source.poll_fps > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "source.poll_fps must be positive, got {}",
                self.source.poll_fps
            )));
        }
        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "output.jpeg_quality must be within 1..=100, got {}",
                self.output.jpeg_quality
            )));
        }
        if self.retry.initial_backoff_ms == 0 || self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "retry backoff must satisfy 0 < initial ({}) <= max ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_source_url() -> String {
    "http://127.0.0.1:8080/stream".into()
}
fn default_mode() -> SourceMode {
    SourceMode::Mjpeg
}
fn default_poll_fps() -> f64 {
    10.0
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_output_path() -> PathBuf {
    PathBuf::from("output_frames")
}
fn default_persist_rejected() -> bool {
    true
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_interval() -> f64 {
    1.0
}
fn default_darkness() -> f64 {
    40.0
}
fn default_blur() -> f64 {
    100.0
}
fn default_similarity() -> f64 {
    2.0
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".into()
}
