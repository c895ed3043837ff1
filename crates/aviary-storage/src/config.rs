//! Storage Configuration
//!
//! Knobs for the supervisor's serve loop. Every interval is serialized as
//! milliseconds; every size is bytes (decimal megabytes in the defaults).
//!
//! | option                | effect                                        | default |
//! |-----------------------|-----------------------------------------------|---------|
//! | `dir`                 | trail directory                               | required |
//! | `pack_interval`       | minimum duration between forced packs         | 1 min   |
//! | `pack_size_threshold` | active-segment bytes that force a pack        | 50 MB   |
//! | `disk_budget`         | max total packed bytes, excess trimmed oldest | 300 MB  |
//! | `sync_interval`       | how often buffered records are flushed        | 1 sec   |
//! | `trim_check_interval` | how often the budget is enforced              | 1 min   |
//! | `batch_size`          | batch flushed immediately when reached        | 100     |
//! | `sink_capacity`       | capacity of the multiplexer subscription      | 1000    |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MEGABYTE: u64 = 1000 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory the trail lives in.
    pub dir: PathBuf,

    /// Minimum duration between forced packs.
    #[serde(default = "default_pack_interval", with = "duration_ms")]
    pub pack_interval: Duration,

    /// Active-segment size that forces a pack ahead of the interval.
    /// Checked every `pack_interval / 4`.
    #[serde(default = "default_pack_size_threshold")]
    pub pack_size_threshold: u64,

    /// Maximum total size of packed segments; the excess is trimmed
    /// oldest-first.
    #[serde(default = "default_disk_budget")]
    pub disk_budget: u64,

    /// How often the in-memory batch is flushed to the trail.
    #[serde(default = "default_sync_interval", with = "duration_ms")]
    pub sync_interval: Duration,

    /// How often the disk budget is enforced.
    #[serde(default = "default_trim_check_interval", with = "duration_ms")]
    pub trim_check_interval: Duration,

    /// A batch reaching this many records is flushed immediately.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Capacity of the supervisor's own subscription to the multiplexer.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
}

impl StorageConfig {
    /// Config with every knob at its default, persisting into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pack_interval: default_pack_interval(),
            pack_size_threshold: default_pack_size_threshold(),
            disk_budget: default_disk_budget(),
            sync_interval: default_sync_interval(),
            trim_check_interval: default_trim_check_interval(),
            batch_size: default_batch_size(),
            sink_capacity: default_sink_capacity(),
        }
    }
}

fn default_pack_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_pack_size_threshold() -> u64 {
    50 * MEGABYTE
}

fn default_disk_budget() -> u64 {
    300 * MEGABYTE
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_trim_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_batch_size() -> usize {
    100
}

fn default_sink_capacity() -> usize {
    1000
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
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
