//! # Scheduler Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! worker_count = 4
//! worker_name_prefix = "tessera-worker"
//! named_threads = ["game", "render"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TaskError, TaskResult};
use crate::route::NamedThread;

/// Default OS thread name prefix for pool workers.
pub const DEFAULT_WORKER_NAME_PREFIX: &str = "tessera-worker";

/// Scheduler thread layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Number of anonymous pool workers.
    pub worker_count: usize,
    /// Pool workers are named `{prefix}-{index}`.
    pub worker_name_prefix: String,
    /// Named threads to start. Routes to any other named thread run inline.
    pub named_threads: Vec<NamedThread>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism().map_or(1, |n| n.get()),
            worker_name_prefix: DEFAULT_WORKER_NAME_PREFIX.to_owned(),
            named_threads: Vec::new(),
        }
    }
}

impl SchedulerConfig {
    /// Default layout with exactly `worker_count` workers.
    #[must_use]
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Adds a named thread to start.
    #[must_use]
    pub fn with_named_thread(mut self, thread: NamedThread) -> Self {
        self.named_threads.push(thread);
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] on malformed TOML or rejected values.
    pub fn from_toml_str(source: &str) -> TaskResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| TaskError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> TaskResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| TaskError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks worker count, prefix and named thread uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> TaskResult<()> {
        if self.worker_count == 0 {
            return Err(TaskError::InvalidConfig(
                "worker_count must be at least 1".to_owned(),
            ));
        }
        if self.worker_name_prefix.is_empty() {
            return Err(TaskError::InvalidConfig(
                "worker_name_prefix must not be empty".to_owned(),
            ));
        }
        let mut seen = [false; NamedThread::COUNT];
        for thread in &self.named_threads {
            if std::mem::replace(&mut seen[thread.index()], true) {
                return Err(TaskError::InvalidConfig(format!(
                    "named thread {thread} listed twice"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.worker_name_prefix, DEFAULT_WORKER_NAME_PREFIX);
        assert!(config.named_threads.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_document() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            worker_count = 3
            worker_name_prefix = "frame"
            named_threads = ["game", "rhi"]
            "#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.worker_name_prefix, "frame");
        assert_eq!(config.named_threads, vec![NamedThread::Game, NamedThread::Rhi]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = SchedulerConfig::from_toml_str("worker_count = 2").unwrap();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.worker_name_prefix, DEFAULT_WORKER_NAME_PREFIX);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = SchedulerConfig::from_toml_str("worker_count = 0").unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_duplicate_named_thread() {
        let config = SchedulerConfig::with_workers(1)
            .with_named_thread(NamedThread::Game)
            .with_named_thread(NamedThread::Game);
        assert!(matches!(config.validate(), Err(TaskError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unknown_thread_and_field() {
        assert!(SchedulerConfig::from_toml_str(r#"named_threads = ["physics"]"#).is_err());
        assert!(SchedulerConfig::from_toml_str("workers = 2").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = SchedulerConfig::from_toml_file("/nonexistent/tessera.toml").unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig(_)));
    }
}
