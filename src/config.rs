use std::time::Duration;

use anyhow::bail;
use tracing::trace;

use crate::checks::MetricKey;

const MIN_TIMEOUT: u64 = 1;

const MAX_TIMEOUT: u64 = 30;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AgentConfig {
    /// Timeout in seconds for network probes made by the checks
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Metric keys that are reported as unsupported
    #[serde(default)]
    pub deny_keys: Vec<MetricKey>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            deny_keys: Vec::new(),
        }
    }
}

fn default_timeout() -> u64 {
    3
}

impl AgentConfig {
    /// Probe timeout, kept within the accepted range
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT))
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&self.timeout) {
            bail!(
                "timeout must be between {MIN_TIMEOUT} and {MAX_TIMEOUT} seconds, got {}",
                self.timeout
            );
        }
        Ok(self)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<AgentConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str::<AgentConfig>(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?
        .validate()
        .inspect(|config| trace!("loaded config: {config:?}"))
}
