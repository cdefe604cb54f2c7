use anyhow::Context;
use scancore::broadcast::HubConfig;
use scancore::prelude::StageConfig;
use scancore::spectral::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Synthetic sensor stream settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub seed: u64,
    /// Relative jitter applied to generated readings.
    pub jitter: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 100,
            seed: 0,
            jitter: 0.05,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub bind: String,
    /// Per-viewer outbound queue length.
    pub subscriber_queue: usize,
    /// Environmental readings kept for multi-point preservation.
    pub environment_history: usize,
    pub radar: StageConfig,
    pub classifier: ClassifierConfig,
    pub hub: HubConfig,
    pub stream: StreamConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9000".to_string(),
            subscriber_queue: 32,
            environment_history: 50,
            radar: StageConfig::default(),
            classifier: ClassifierConfig::default(),
            hub: HubConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Command-line values win over the file.
    pub fn apply_overrides(
        &mut self,
        bind: Option<String>,
        stream: bool,
        interval_ms: Option<u64>,
        seed: Option<u64>,
    ) {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if stream {
            self.stream.enabled = true;
        }
        if let Some(interval) = interval_ms {
            self.stream.interval_ms = interval.max(1);
        }
        if let Some(seed) = seed {
            self.stream.seed = seed;
        }
    }

    pub fn bind_address(&self) -> anyhow::Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("invalid bind address {}", self.bind))
    }
}
