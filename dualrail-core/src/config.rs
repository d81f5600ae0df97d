//! Process-wide configuration, read directly from the environment.

use std::env;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Recognized configuration options (§6 of the pipeline contract).
#[derive(Debug, Clone)]
pub struct Settings {
    pub event_retention_days: u32,
    pub rated_usage_retention_days: u32,
    pub deriver_window_minutes: u32,
    pub external_metrics_interval_sec: u64,
    pub metrics_max_concurrent: usize,
    pub rating_worker_concurrency: usize,
    pub prometheus_endpoint: Option<String>,
    pub prometheus_bearer_token: Option<String>,
    pub prometheus_username: Option<String>,
    pub prometheus_password: Option<String>,
}

impl Settings {
    /// Load settings from the environment, falling back to documented
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            event_retention_days: env_or("EVENT_RETENTION_DAYS", 90),
            rated_usage_retention_days: env_or("RATED_USAGE_RETENTION_DAYS", 365),
            deriver_window_minutes: env_or("DERIVER_WINDOW_MINUTES", 5),
            external_metrics_interval_sec: env_or("EXTERNAL_METRICS_INTERVAL_SEC", 300),
            metrics_max_concurrent: env_or("METRICS_MAX_CONCURRENT", 5),
            rating_worker_concurrency: env_or("RATING_WORKER_CONCURRENCY", 8),
            prometheus_endpoint: env_opt("PROMETHEUS_ENDPOINT"),
            prometheus_bearer_token: env_opt("PROMETHEUS_BEARER_TOKEN"),
            prometheus_username: env_opt("PROMETHEUS_USERNAME"),
            prometheus_password: env_opt("PROMETHEUS_PASSWORD"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            event_retention_days: 90,
            rated_usage_retention_days: 365,
            deriver_window_minutes: 5,
            external_metrics_interval_sec: 300,
            metrics_max_concurrent: 5,
            rating_worker_concurrency: 8,
            prometheus_endpoint: None,
            prometheus_bearer_token: None,
            prometheus_username: None,
            prometheus_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.event_retention_days, 90);
        assert_eq!(s.rated_usage_retention_days, 365);
        assert_eq!(s.deriver_window_minutes, 5);
        assert_eq!(s.external_metrics_interval_sec, 300);
        assert_eq!(s.metrics_max_concurrent, 5);
        assert_eq!(s.rating_worker_concurrency, 8);
    }
}
