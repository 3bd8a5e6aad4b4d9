//! EC2 client for region, instance and metadata-default operations

mod metadata;
mod operations;
mod types;

pub use operations::{Ec2Api, RegionClients};
pub use types::InstancePage;

use crate::aws::error::api_error_from_sdk;
use aws_sdk_ec2::types::{Filter, Region};
use aws_sdk_ec2::Client;
use imdsv2_common::defaults::SCANNABLE_OPT_IN_STATUSES;
use imdsv2_common::{ApiError, ApplyState, TokenMode};
use tracing::debug;

/// Page size requested from DescribeInstances
const DESCRIBE_INSTANCES_PAGE_SIZE: i32 = 1000;

/// EC2 client bound to a single region
#[derive(Debug, Clone)]
pub struct Ec2Client {
    pub(crate) client: Client,
    region: String,
}

impl Ec2Client {
    pub fn new(client: Client, region: &str) -> Self {
        Self {
            client,
            region: region.to_string(),
        }
    }

    async fn list_regions(&self, dry_run: bool) -> Result<Vec<Region>, ApiError> {
        let opt_in = Filter::builder()
            .name("opt-in-status")
            .set_values(Some(
                SCANNABLE_OPT_IN_STATUSES
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect(),
            ))
            .build();

        let response = self
            .client
            .describe_regions()
            .all_regions(false)
            .dry_run(dry_run)
            .filters(opt_in)
            .send()
            .await
            .map_err(api_error_from_sdk)?;

        Ok(response.regions().to_vec())
    }

    async fn list_instances_page(
        &self,
        next_token: Option<String>,
    ) -> Result<InstancePage, ApiError> {
        let response = self
            .client
            .describe_instances()
            .set_next_token(next_token)
            .max_results(DESCRIBE_INSTANCES_PAGE_SIZE)
            .send()
            .await
            .map_err(api_error_from_sdk)?;

        let instances: Vec<_> = response
            .reservations()
            .iter()
            .flat_map(|r| r.instances().iter().cloned())
            .collect();

        let next_token = response
            .next_token()
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        debug!(
            region = %self.region,
            count = instances.len(),
            more = next_token.is_some(),
            "Fetched instance page"
        );

        Ok(InstancePage {
            instances,
            next_token,
        })
    }
}

impl Ec2Api for Ec2Client {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_regions(&self, dry_run: bool) -> Result<Vec<Region>, ApiError> {
        self.list_regions(dry_run).await
    }

    async fn describe_instances_page(
        &self,
        next_token: Option<String>,
    ) -> Result<InstancePage, ApiError> {
        self.list_instances_page(next_token).await
    }

    async fn get_metadata_defaults(&self) -> Result<Option<TokenMode>, ApiError> {
        self.account_metadata_defaults().await
    }

    async fn require_instance_tokens(&self, instance_id: &str) -> Result<ApplyState, ApiError> {
        self.modify_instance_tokens(instance_id).await
    }

    async fn require_default_tokens(&self) -> Result<bool, ApiError> {
        self.modify_default_tokens().await
    }
}
