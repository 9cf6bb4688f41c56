//! Configuration module for Frameflow
//!
//! One [`FrameflowConfig`] covers the engine defaults and the demo binary:
//! - `streaming` - default delivery policy and port capacities
//! - `streamer` - pacing and length of the demo stream
//! - `logging` - tracing filter and optional log directory
//!
//! # Files
//!
//! Configuration is read from TOML (`.toml`) or JSON (any other extension).
//! Every field has a default, so a partial file is valid.
//!
//! # Example
//!
//! ```ignore
//! use frameflow::config::FrameflowConfig;
//!
//! let config = FrameflowConfig::load_or_default("frameflow.toml");
//! let pipeline = frameflow::Pipeline::new(&config.streaming);
//! config.save("frameflow.json")?;
//! ```

use crate::error::{FrameflowError, Result};
use crate::pipeline::port::{DeliveryPolicy, DEFAULT_STATIC_CAPACITY, DEFAULT_STREAM_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default pause between two streamed frames in milliseconds
pub const DEFAULT_PACING_MS: u64 = 10;

/// Default number of frames emitted by a streamer
pub const DEFAULT_TOTAL_FRAMES: u64 = 20;

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,frameflow=debug";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameflowConfig {
    pub streaming: StreamingConfig,
    pub streamer: StreamerConfig,
    pub logging: LoggingConfig,
}

/// Engine-wide delivery defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Delivery policy given to the ports of newly added stages
    pub mode: DeliveryPolicy,

    /// Queue length for ports carrying dynamic records
    pub stream_queue_capacity: usize,

    /// Queue length for ports carrying static records
    pub static_queue_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryPolicy::QueuedAll,
            stream_queue_capacity: DEFAULT_STREAM_CAPACITY,
            static_queue_capacity: DEFAULT_STATIC_CAPACITY,
        }
    }
}

/// Defaults for `StreamerStage::from_config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    pub pacing_ms: u64,
    pub total_frames: u64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            pacing_ms: DEFAULT_PACING_MS,
            total_frames: DEFAULT_TOTAL_FRAMES,
        }
    }
}

/// Logging setup for the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Directory for a daily rolling log file; console only when `None`
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}

impl FrameflowConfig {
    /// Load a configuration file; the format follows the extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FrameflowError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                FrameflowError::Config(format!("Failed to parse config {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                FrameflowError::Config(format!("Failed to parse config {:?}: {}", path, e))
            })
        }
    }

    /// Load a configuration file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to disk; the format follows the extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FrameflowError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| FrameflowError::Serialization(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| FrameflowError::Serialization(e.to_string()))?
        };

        std::fs::write(path, content).map_err(|e| {
            FrameflowError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }
}
