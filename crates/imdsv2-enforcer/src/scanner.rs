//! Instance and account-default scanning across regions
//!
//! Each region is scanned independently with bounded concurrency. A region
//! that fails is recorded once in the error log and contributes nothing;
//! the other regions are unaffected.

use std::collections::BTreeMap;

use aws_sdk_ec2::types::Instance;
use futures::stream::{self, StreamExt};
use imdsv2_common::{AccountDefaultRecord, ApiError, Component, ErrorLog, InstanceRecord, TokenMode};
use tracing::{debug, info};

use crate::aws::{Ec2Api, RegionClients};

/// Endpoint state assumed when the provider omits it
const DEFAULT_HTTP_ENDPOINT: &str = "enabled";

/// Lifecycle state used when the provider omits it
const UNKNOWN_STATE: &str = "unknown";

/// Normalise one provider instance into a record.
///
/// Returns `None` for instances without an ID.
pub fn parse_instance(instance: &Instance, region: &str) -> Option<InstanceRecord> {
    let instance_id = instance.instance_id()?.to_string();

    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| n.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_STATE.to_string());

    let name = instance
        .tags()
        .iter()
        .find(|t| t.key() == Some("Name"))
        .and_then(|t| t.value())
        .map(str::to_string);

    let (http_tokens, http_endpoint) = match instance.metadata_options() {
        Some(options) => (
            options.http_tokens().map(|t| TokenMode::parse(t.as_str())),
            Some(
                options
                    .http_endpoint()
                    .map(|e| e.as_str())
                    .unwrap_or(DEFAULT_HTTP_ENDPOINT)
                    .to_string(),
            ),
        ),
        None => (None, Some(DEFAULT_HTTP_ENDPOINT.to_string())),
    };

    Some(InstanceRecord {
        instance_id,
        region: region.to_string(),
        state,
        http_tokens,
        http_endpoint,
        name,
    })
}

async fn collect_region<C: Ec2Api>(client: &C) -> Result<Vec<InstanceRecord>, ApiError> {
    let region = client.region();
    let mut records = Vec::new();
    let mut next_token = None;
    let mut pages = 0usize;

    loop {
        let page = client.describe_instances_page(next_token).await?;
        pages += 1;

        for instance in &page.instances {
            match parse_instance(instance, region) {
                Some(record) => records.push(record),
                None => debug!(region = %region, "Skipping instance without an ID"),
            }
        }

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    debug!(region = %region, pages, count = records.len(), "Region scan complete");
    Ok(records)
}

/// Scan every instance in one region, following pagination to the end.
///
/// On error, records collected from earlier pages are discarded and exactly
/// one error is recorded for the region.
pub async fn scan_region<C: Ec2Api>(client: &C, errors: &ErrorLog) -> Vec<InstanceRecord> {
    match collect_region(client).await {
        Ok(records) => records,
        Err(err) => {
            errors.record_api_error(Component::InstanceScanner, Some(client.region()), None, &err);
            Vec::new()
        }
    }
}

/// Scan all regions with at most `limit` regions in flight.
///
/// The map is keyed by region and every region appears, failed ones with an
/// empty list. Records within a region are sorted by instance ID.
pub async fn scan_instances<R: RegionClients>(
    clients: &R,
    regions: &[String],
    limit: usize,
    errors: &ErrorLog,
) -> BTreeMap<String, Vec<InstanceRecord>> {
    let scanned: Vec<(String, Vec<InstanceRecord>)> = stream::iter(regions.iter().cloned())
        .map(|region| async move {
            let client = clients.client_for(&region);
            let records = scan_region(&client, errors).await;
            (region, records)
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    let mut by_region = BTreeMap::new();
    for (region, mut records) in scanned {
        records.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        by_region.insert(region, records);
    }

    let total: usize = by_region.values().map(Vec::len).sum();
    info!(regions = by_region.len(), instances = total, "Instance scan complete");
    by_region
}

/// Read one region's account-level default, `None` on failure
pub async fn get_account_default<C: Ec2Api>(client: &C, errors: &ErrorLog) -> Option<TokenMode> {
    match client.get_metadata_defaults().await {
        Ok(mode) => mode,
        Err(err) => {
            errors.record_api_error(Component::AccountDefaults, Some(client.region()), None, &err);
            None
        }
    }
}

/// Read the account default of every region with at most `limit` reads in
/// flight, sorted by region.
pub async fn check_account_defaults<R: RegionClients>(
    clients: &R,
    regions: &[String],
    limit: usize,
    errors: &ErrorLog,
) -> Vec<AccountDefaultRecord> {
    let mut records: Vec<AccountDefaultRecord> = stream::iter(regions.iter().cloned())
        .map(|region| async move {
            let client = clients.client_for(&region);
            let http_tokens = get_account_default(&client, errors).await;
            AccountDefaultRecord { region, http_tokens }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    records.sort_by(|a, b| a.region.cmp(&b.region));
    info!(regions = records.len(), "Account default check complete");
    records
}

/// Flatten the per-region map into one list ordered by `(region, instance_id)`
pub fn flatten_instances(by_region: &BTreeMap<String, Vec<InstanceRecord>>) -> Vec<InstanceRecord> {
    by_region.values().flatten().cloned().collect()
}
