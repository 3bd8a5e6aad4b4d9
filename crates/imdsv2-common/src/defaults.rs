//! Default configuration values
//!
//! Concurrency caps and pacing used by the scan and mutation phases. The caps
//! are per phase; the instance scan and the account-default check hit
//! different API surfaces and get independent pools.

use std::time::Duration;

/// Region used for account-wide calls when the profile does not set one
pub const DEFAULT_HOME_REGION: &str = "us-east-1";

/// Maximum number of regions whose instances are listed at the same time
pub const INSTANCE_SCAN_CONCURRENCY: usize = 15;

/// Maximum number of concurrent account-default reads
pub const DEFAULTS_CHECK_CONCURRENCY: usize = 10;

/// Maximum number of concurrent account-default modifications
pub const DEFAULTS_MUTATION_CONCURRENCY: usize = 10;

/// Maximum number of regions mutating instances at the same time.
///
/// Each region is its own rate-limit bucket; inside a region instance
/// mutations are strictly sequential.
pub const INSTANCE_MUTATION_REGION_CONCURRENCY: usize = 15;

/// Delay between consecutive instance mutations in the same region
pub const MUTATION_PACING: Duration = Duration::from_millis(100);

/// Throttled mutations are retried this many times before being reported as failed
pub const THROTTLE_RETRY_MAX_TIMES: usize = 4;

/// First backoff delay after a throttling error
pub const THROTTLE_RETRY_MIN_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for the throttling backoff
pub const THROTTLE_RETRY_MAX_DELAY: Duration = Duration::from_secs(8);

/// Opt-in statuses of regions that can be scanned without extra account setup
pub const SCANNABLE_OPT_IN_STATUSES: &[&str] = &["opt-in-not-required", "opted-in"];

/// IAM actions the enforcer needs
pub const REQUIRED_PERMISSIONS: &[&str] = &[
    "ec2:DescribeRegions",
    "ec2:DescribeInstances",
    "ec2:ModifyInstanceMetadataOptions",
    "ec2:GetInstanceMetadataDefaults",
    "ec2:ModifyInstanceMetadataDefaults",
];
