//! Configuration types for an enforcement run

use backon::ExponentialBuilder;
use imdsv2_common::defaults::{
    DEFAULTS_CHECK_CONCURRENCY, DEFAULTS_MUTATION_CONCURRENCY, INSTANCE_MUTATION_REGION_CONCURRENCY,
    INSTANCE_SCAN_CONCURRENCY, MUTATION_PACING, THROTTLE_RETRY_MAX_DELAY, THROTTLE_RETRY_MAX_TIMES,
    THROTTLE_RETRY_MIN_DELAY,
};
use std::time::Duration;

/// Parallelism limits for each phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyConfig {
    /// Regions scanned for instances at the same time
    pub instance_scans: usize,
    /// Account-default reads in flight
    pub default_checks: usize,
    /// Account-default mutations in flight
    pub default_mutations: usize,
    /// Regions mutating instances at the same time
    pub mutation_regions: usize,
    /// Pause between consecutive instance mutations in one region
    pub mutation_pacing: Duration,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            instance_scans: INSTANCE_SCAN_CONCURRENCY,
            default_checks: DEFAULTS_CHECK_CONCURRENCY,
            default_mutations: DEFAULTS_MUTATION_CONCURRENCY,
            mutation_regions: INSTANCE_MUTATION_REGION_CONCURRENCY,
            mutation_pacing: MUTATION_PACING,
        }
    }
}

/// Backoff policy for throttled mutations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_times: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Build the `backon` policy for this config
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_times)
            .with_jitter()
    }

    /// Policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_times: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_times: THROTTLE_RETRY_MAX_TIMES,
            min_delay: THROTTLE_RETRY_MIN_DELAY,
            max_delay: THROTTLE_RETRY_MAX_DELAY,
        }
    }
}

/// Configuration for one enforcement run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// AWS named profile used for every call
    pub profile: String,
    pub limits: ConcurrencyConfig,
    pub retry: RetryConfig,
}

impl RunConfig {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            limits: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = RunConfig::new("prod");
        assert_eq!(config.profile, "prod");
        assert_eq!(config.limits.instance_scans, 15);
        assert_eq!(config.limits.default_checks, 10);
        assert_eq!(config.limits.default_mutations, 10);
        assert_eq!(config.limits.mutation_regions, 15);
        assert_eq!(config.limits.mutation_pacing, Duration::from_millis(100));
    }

    #[test]
    fn disabled_retry_keeps_delays() {
        let retry = RetryConfig::disabled();
        assert_eq!(retry.max_times, 0);
        assert_eq!(retry.min_delay, THROTTLE_RETRY_MIN_DELAY);
    }
}
