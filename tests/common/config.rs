//! Test configuration builders

use afr_harvest::config::{Config, RetryPolicy};
use std::path::Path;
use std::time::Duration;

/// Config with fast timeouts pointed at a scratch directory
pub fn test_config(scratch: &Path, pool_size: usize) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = scratch.join("harvest.db");
    config.harvest.pool_size = pool_size;
    config.harvest.output_dir = scratch.join("outputs");
    config.harvest.download_poll_interval = Duration::from_millis(5);
    config.harvest.download_timeout = Duration::from_millis(500);
    config.harvest.progress_interval = Duration::from_millis(50);
    config.enumeration.poll_interval = Duration::from_millis(1);
    config.selection_retry = RetryPolicy {
        max_attempts: 3,
        backoff_base: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: false,
    };
    config.export_retry = config.selection_retry.clone();
    config
}
