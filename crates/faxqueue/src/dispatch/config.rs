use std::time::Duration;

use crate::config::Config;

/// Runtime settings for the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Pause after a dispatched job.
    pub busy_interval: Duration,
    /// Pause when nothing was pending.
    pub idle_interval: Duration,
    /// Pause after the store failed to answer.
    pub store_error_backoff: Duration,
    pub cleanup_attempts: u32,
    pub cleanup_delay: Duration,
    pub reclaim_stale_after: Option<Duration>,
    pub notify_on_failure: bool,
}

impl DispatchConfig {
    pub fn from_config(config: &Config) -> Self {
        let dispatch = &config.dispatch;
        Self {
            max_attempts: dispatch.max_attempts.max(1),
            retry_backoff: Duration::from_secs(dispatch.retry_backoff_secs),
            busy_interval: Duration::from_millis(dispatch.busy_interval_ms),
            idle_interval: Duration::from_secs(dispatch.idle_interval_secs),
            store_error_backoff: Duration::from_secs(dispatch.store_error_backoff_secs),
            cleanup_attempts: config.cleanup.attempts.max(1),
            cleanup_delay: Duration::from_millis(config.cleanup.delay_ms),
            reclaim_stale_after: dispatch.reclaim_stale_after_secs.map(Duration::from_secs),
            notify_on_failure: config.notification.notify_on_failure,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_secs(5),
            busy_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(5),
            store_error_backoff: Duration::from_secs(5),
            cleanup_attempts: 5,
            cleanup_delay: Duration::from_secs(2),
            reclaim_stale_after: None,
            notify_on_failure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_from_config() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "dispatch": { "max_attempts": 4, "busy_interval_ms": 250, "reclaim_stale_after_secs": 600 },
                "cleanup": { "attempts": 2, "delay_ms": 10 },
                "gateway": { "program": "sendfax" }
            }"#,
        )
        .unwrap();

        let dispatch = DispatchConfig::from_config(&config);
        assert_eq!(dispatch.max_attempts, 4);
        assert_eq!(dispatch.retry_backoff, Duration::from_secs(5));
        assert_eq!(dispatch.busy_interval, Duration::from_millis(250));
        assert_eq!(dispatch.cleanup_attempts, 2);
        assert_eq!(dispatch.cleanup_delay, Duration::from_millis(10));
        assert_eq!(dispatch.reclaim_stale_after, Some(Duration::from_secs(600)));
        assert!(!dispatch.notify_on_failure);
    }
}
