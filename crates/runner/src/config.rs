#![forbid(unsafe_code)]

use crate::RunError;
use std::time::Duration;

const DEFAULT_MAX_PARALLEL: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on handler threads alive at once. Zero is treated as one.
    pub max_parallel: usize,
    /// A node still running after this long completes as failed.
    pub node_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            node_timeout: None,
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RunnerConfig {
    /// Reads `WB_RUNNER_MAX_PARALLEL` and `WB_RUNNER_NODE_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, RunError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RunError> {
        let mut config = Self::default();
        if let Some(raw) = non_empty(lookup("WB_RUNNER_MAX_PARALLEL")) {
            config.max_parallel = raw.parse::<usize>().map_err(|_| {
                RunError::InvalidConfig("WB_RUNNER_MAX_PARALLEL must be a positive integer")
            })?;
            if config.max_parallel == 0 {
                return Err(RunError::InvalidConfig(
                    "WB_RUNNER_MAX_PARALLEL must be a positive integer",
                ));
            }
        }
        if let Some(raw) = non_empty(lookup("WB_RUNNER_NODE_TIMEOUT_MS")) {
            let ms = raw.parse::<u64>().map_err(|_| {
                RunError::InvalidConfig("WB_RUNNER_NODE_TIMEOUT_MS must be an integer")
            })?;
            // 0 disables the timeout.
            config.node_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        Ok(config)
    }

    pub(crate) fn parallelism(&self) -> usize {
        self.max_parallel.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = RunnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.parallelism(), DEFAULT_MAX_PARALLEL);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("WB_RUNNER_MAX_PARALLEL", " 2 "),
            ("WB_RUNNER_NODE_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.node_timeout, Some(Duration::from_millis(1500)));

        let config =
            RunnerConfig::from_lookup(lookup(&[("WB_RUNNER_NODE_TIMEOUT_MS", "0")])).unwrap();
        assert_eq!(config.node_timeout, None);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(RunnerConfig::from_lookup(lookup(&[("WB_RUNNER_MAX_PARALLEL", "0")])).is_err());
        assert!(RunnerConfig::from_lookup(lookup(&[("WB_RUNNER_MAX_PARALLEL", "many")])).is_err());
        assert!(
            RunnerConfig::from_lookup(lookup(&[("WB_RUNNER_NODE_TIMEOUT_MS", "-5")])).is_err()
        );
    }
}
