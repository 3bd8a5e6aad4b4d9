//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once per run and
//! creating per-region EC2 clients from the same credentials.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use imdsv2_common::defaults::DEFAULT_HOME_REGION;
use std::sync::Arc;

use super::ec2::{Ec2Client, RegionClients};

/// Shared AWS configuration context for creating service clients.
///
/// Credentials are resolved once from the named profile; every region gets
/// its own EC2 client built from that config with the region overridden.
///
/// # Example
/// ```ignore
/// let aws = AwsContext::with_profile("production").await;
///
/// let home = aws.ec2_client(aws.home_region());
/// let eu = aws.ec2_client("eu-west-1");
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    home_region: String,
}

impl AwsContext {
    /// Load AWS configuration for the given profile.
    ///
    /// The home region comes from the profile (or the environment) and falls
    /// back to `us-east-1` when neither sets one.
    pub async fn with_profile(profile: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .load()
            .await;

        let home_region = config
            .region()
            .map(ToString::to_string)
            .unwrap_or_else(|| DEFAULT_HOME_REGION.to_string());

        Self {
            config: Arc::new(config),
            home_region,
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Region used for account-wide calls (region listing, preflight).
    pub fn home_region(&self) -> &str {
        &self.home_region
    }

    /// Create an EC2 SDK client bound to `region`.
    pub fn ec2_client(&self, region: &str) -> aws_sdk_ec2::Client {
        let conf = aws_sdk_ec2::config::Builder::from(self.sdk_config())
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_ec2::Client::from_conf(conf)
    }
}

impl RegionClients for AwsContext {
    type Client = Ec2Client;

    fn client_for(&self, region: &str) -> Ec2Client {
        Ec2Client::new(self.ec2_client(region), region)
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("home_region", &self.home_region)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests resolve real credentials and are skipped in regular runs

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_context_creation() {
        let profile = std::env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string());
        let ctx = AwsContext::with_profile(&profile).await;
        assert!(!ctx.home_region().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials"]
    async fn test_client_for_region() {
        let profile = std::env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string());
        let ctx = AwsContext::with_profile(&profile).await;
        let client = ctx.client_for("eu-west-1");
        assert_eq!(client.region(), "eu-west-1");
    }
}
