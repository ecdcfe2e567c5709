use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::error::Error;

/// Channel-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub pull: PullConfig,
}

/// Dispatch worker pool tuning.
///
/// The pool keeps `core_workers` workers alive permanently and grows up to
/// `max_workers` under load; spare workers retire after `keep_alive` idle.
/// `queue_capacity: None` means an unbounded backlog (the default); with a
/// bound, submission never blocks and rejects instead when full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_core_workers")]
    pub core_workers: usize,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_keep_alive", with = "duration_secs")]
    pub keep_alive: Duration,

    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Sizing hint for the admins' live sets.
    #[serde(default = "default_estimated_consumers")]
    pub estimated_consumers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            core_workers: default_core_workers(),
            max_workers: default_max_workers(),
            keep_alive: default_keep_alive(),
            queue_capacity: None,
            estimated_consumers: default_estimated_consumers(),
        }
    }
}

/// Pull-consumer polling loop tuning. Default values only; the loop is
/// cancellation-aware and never depends on these for correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Backoff after an empty `try_pull`.
    #[serde(default = "default_poll_interval", with = "duration_ms")]
    pub poll_interval: Duration,

    /// Wait between rechecks while the proxy is not yet connected.
    #[serde(default = "default_idle_interval", with = "duration_ms")]
    pub idle_interval: Duration,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            idle_interval: default_idle_interval(),
        }
    }
}

impl ChannelConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::config(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| Error::config(e.to_string()))
    }
}

fn default_core_workers() -> usize {
    10
}

fn default_max_workers() -> usize {
    20
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(180)
}

fn default_estimated_consumers() -> usize {
    10
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_idle_interval() -> Duration {
    Duration::from_millis(1000)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
