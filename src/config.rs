//! Configuration for the coordinator and its agents.
//!
//! Defaults come from environment variables when set, falling back to built-in
//! values:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `TRACELINK_BATCH_THRESHOLD` | items per `dataCollected` batch | `100` |
//! | `TRACELINK_RESUME_CONFIG` | `default` or `restored` | `default` |
//! | `TRACELINK_FLUSH_FRAGMENT_SIZE` | events per trace log fragment | `64` |
//! | `TRACELINK_RING_CAPACITY` | runtime tracer ring size | `256` |

use crate::capture::{DEFAULT_FLUSH_FRAGMENT_SIZE, DEFAULT_RING_CAPACITY};
use crate::{Result, TracelinkError};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

/// Aggregate size at which a `dataCollected` batch is emitted
pub const DEFAULT_BATCH_THRESHOLD: usize = 100;

/// Which trace config agents are restarted with when a frozen session resumes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumeConfig {
    /// Restart with a fresh default config; the restored category filter is not
    /// re-applied to the capture, only to the session state
    #[default]
    Default,
    /// Restart with a config built from the restored categories
    RestoredCategories,
}

impl FromStr for ResumeConfig {
    type Err = TracelinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(ResumeConfig::Default),
            "restored" | "restored_categories" => Ok(ResumeConfig::RestoredCategories),
            other => Err(TracelinkError::ConfigError(format!("Unknown resume config: {}", other))),
        }
    }
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub batch_threshold: usize,
    pub resume_config: ResumeConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_threshold: env_or("TRACELINK_BATCH_THRESHOLD", DEFAULT_BATCH_THRESHOLD),
            resume_config: env_or("TRACELINK_RESUME_CONFIG", ResumeConfig::Default),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_batch_threshold(mut self, batch_threshold: usize) -> Self {
        self.batch_threshold = batch_threshold;
        self
    }

    pub fn with_resume_config(mut self, resume_config: ResumeConfig) -> Self {
        self.resume_config = resume_config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_threshold == 0 {
            return Err(TracelinkError::ConfigError(
                "batch_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the built-in agents
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Events per fragment when flushing the trace log
    pub flush_fragment_size: usize,
    /// Ring buffer capacity of the runtime tracer
    pub ring_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            flush_fragment_size: env_or(
                "TRACELINK_FLUSH_FRAGMENT_SIZE",
                DEFAULT_FLUSH_FRAGMENT_SIZE,
            ),
            ring_capacity: env_or("TRACELINK_RING_CAPACITY", DEFAULT_RING_CAPACITY),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    parse_or(key, std::env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(key, value = raw.as_str(), error = %e, "Ignoring invalid setting");
            default
        }),
        None => default,
    }
}
