//! Configuration and dependency initialization for the worker.

mod dependencies;

pub use dependencies::{ConnectionMode, Dependencies};

use std::env;
use std::time::Duration;

use crate::extract::DEFAULT_SUMMARY_CHARS;

/// Default interval between progress log lines.
const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 10;

/// Settings of the worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Run the upload consumer (extraction, indexing, summarization).
    pub run_upload_consumer: bool,
    /// Run the summary consumer.
    pub run_summary_consumer: bool,
    pub progress_interval: Duration,
    /// Keep extracted text in the object store next to the document.
    pub persist_text: bool,
    /// Approximate length of generated summaries, in characters.
    pub summary_chars: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            run_upload_consumer: true,
            run_summary_consumer: true,
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
            persist_text: true,
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

impl WorkerConfig {
    /// Create a WorkerConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WORKER_UPLOAD_CONSUMER` (default: true)
    /// - `WORKER_SUMMARY_CONSUMER` (default: true)
    /// - `WORKER_PROGRESS_INTERVAL_SECS` (default: 10)
    /// - `WORKER_PERSIST_TEXT` (default: true)
    /// - `WORKER_SUMMARY_CHARS` (default: 300)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            run_upload_consumer: env_flag("WORKER_UPLOAD_CONSUMER", defaults.run_upload_consumer),
            run_summary_consumer: env_flag(
                "WORKER_SUMMARY_CONSUMER",
                defaults.run_summary_consumer,
            ),
            progress_interval: env::var("WORKER_PROGRESS_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.progress_interval),
            persist_text: env_flag("WORKER_PERSIST_TEXT", defaults.persist_text),
            summary_chars: env::var("WORKER_SUMMARY_CHARS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.summary_chars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_run_everything() {
        let config = WorkerConfig::default();
        assert!(config.run_upload_consumer);
        assert!(config.run_summary_consumer);
        assert!(config.persist_text);
        assert_eq!(config.progress_interval, Duration::from_secs(10));
        assert_eq!(config.summary_chars, 300);
    }
}
