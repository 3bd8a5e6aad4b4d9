//! EC2 operations traits for testing

use super::types::InstancePage;
use aws_sdk_ec2::types::Region;
use imdsv2_common::{ApiError, ApplyState, TokenMode};
use std::future::Future;

/// The slice of the EC2 API the enforcer depends on, bound to one region.
///
/// This trait abstracts the EC2 client so the scan and mutation logic can be
/// exercised against a scripted fake without hitting real AWS. Every method
/// returns the provider error as a structured [`ApiError`].
pub trait Ec2Api: Send + Sync {
    /// Region this client talks to
    fn region(&self) -> &str;

    /// List regions whose opt-in status allows scanning
    fn describe_regions(
        &self,
        dry_run: bool,
    ) -> impl Future<Output = Result<Vec<Region>, ApiError>> + Send;

    /// Fetch one page of instances; `None` starts from the beginning
    fn describe_instances_page(
        &self,
        next_token: Option<String>,
    ) -> impl Future<Output = Result<InstancePage, ApiError>> + Send;

    /// Read the account-level `HttpTokens` default for this region
    fn get_metadata_defaults(
        &self,
    ) -> impl Future<Output = Result<Option<TokenMode>, ApiError>> + Send;

    /// Set `HttpTokens=required` on one instance
    fn require_instance_tokens(
        &self,
        instance_id: &str,
    ) -> impl Future<Output = Result<ApplyState, ApiError>> + Send;

    /// Set the account-level `HttpTokens` default to `required`.
    ///
    /// Returns the provider's acknowledgement flag.
    fn require_default_tokens(&self) -> impl Future<Output = Result<bool, ApiError>> + Send;
}

/// Factory for per-region EC2 clients sharing one set of credentials
pub trait RegionClients: Send + Sync {
    type Client: Ec2Api;

    fn client_for(&self, region: &str) -> Self::Client;
}
