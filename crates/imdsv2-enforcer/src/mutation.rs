//! Enforcement of `HttpTokens=required`
//!
//! Every attempt produces exactly one [`OperationResult`]. Failures are
//! recorded in the error log and returned as failed results; they never stop
//! other targets from being attempted.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use backon::Retryable;
use futures::stream::{self, StreamExt};
use imdsv2_common::result::sort_results;
use imdsv2_common::{ApiError, Component, ErrorLog, InstanceRecord, OperationResult};
use tracing::{debug, info, warn};

use crate::aws::{Ec2Api, RegionClients, classify_api_error};
use crate::config::RetryConfig;

/// Components whose records duplicate a failed [`OperationResult`]
pub const MUTATION_COMPONENTS: &[Component] =
    &[Component::InstanceModifier, Component::DefaultsModifier];

/// Error code reported when the provider does not acknowledge a default change
pub const UNACKNOWLEDGED_CODE: &str = "Unacknowledged";

/// Run `op`, retrying throttled attempts under `retry`
async fn with_throttle_retry<T, F, Fut>(
    retry: &RetryConfig,
    region: &str,
    target: &str,
    op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    op.retry(retry.backoff())
        .when(|e: &ApiError| classify_api_error(e).is_retryable())
        .notify(|e: &ApiError, dur: Duration| {
            warn!(
                delay = ?dur,
                region = %region,
                target = %target,
                error = %e,
                "AWS rate limited, backing off..."
            );
        })
        .await
}

/// Set `HttpTokens=required` on one instance
pub async fn enforce_instance<C: Ec2Api>(
    client: &C,
    instance_id: &str,
    retry: &RetryConfig,
    errors: &ErrorLog,
) -> OperationResult {
    let region = client.region();
    let outcome = with_throttle_retry(retry, region, instance_id, || {
        client.require_instance_tokens(instance_id)
    })
    .await;

    if let Err(err) = &outcome {
        errors.record_api_error(
            Component::InstanceModifier,
            Some(region),
            Some(instance_id),
            err,
        );
    }

    OperationResult::Instance {
        region: region.to_string(),
        instance_id: instance_id.to_string(),
        outcome,
    }
}

/// Set the account-level default of the client's region to `required`.
///
/// The previous value is read first on a best-effort basis; a failed read is
/// recorded and reported as unknown.
pub async fn enforce_account_default<C: Ec2Api>(
    client: &C,
    retry: &RetryConfig,
    errors: &ErrorLog,
) -> OperationResult {
    let region = client.region();

    let previous = match client.get_metadata_defaults().await {
        Ok(previous) => previous,
        Err(err) => {
            errors.record_api_error(Component::AccountDefaults, Some(region), None, &err);
            None
        }
    };

    let outcome = with_throttle_retry(retry, region, region, || client.require_default_tokens())
        .await
        .and_then(|acknowledged| {
            if acknowledged {
                Ok(())
            } else {
                Err(ApiError::new(
                    UNACKNOWLEDGED_CODE,
                    "ModifyInstanceMetadataDefaults returned false",
                ))
            }
        });

    match &outcome {
        Ok(()) => info!(region = %region, previous = ?previous, "Account default set to required"),
        Err(err) => errors.record_api_error(Component::DefaultsModifier, Some(region), None, err),
    }

    OperationResult::AccountDefault {
        region: region.to_string(),
        previous,
        outcome,
    }
}

/// Instance IDs grouped by region, each group in the order given
fn group_by_region(targets: &[InstanceRecord]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for target in targets {
        groups
            .entry(target.region.clone())
            .or_default()
            .push(target.instance_id.clone());
    }
    groups
}

/// Enforce a region's instances one at a time, pausing `pacing` between calls
async fn enforce_region<C: Ec2Api>(
    client: &C,
    instance_ids: &[String],
    pacing: Duration,
    retry: &RetryConfig,
    errors: &ErrorLog,
) -> Vec<OperationResult> {
    let mut results = Vec::with_capacity(instance_ids.len());
    for (i, instance_id) in instance_ids.iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
        results.push(enforce_instance(client, instance_id, retry, errors).await);
    }
    debug!(region = client.region(), count = results.len(), "Region enforcement complete");
    results
}

/// Enforce every target instance.
///
/// Calls within a region are sequential and paced; up to `region_limit`
/// regions run in parallel. Results are sorted by `(region, instance_id)`.
pub async fn enforce_instances<R: RegionClients>(
    clients: &R,
    targets: &[InstanceRecord],
    pacing: Duration,
    region_limit: usize,
    retry: &RetryConfig,
    errors: &ErrorLog,
) -> Vec<OperationResult> {
    let groups = group_by_region(targets);
    info!(
        instances = targets.len(),
        regions = groups.len(),
        "Enforcing IMDSv2 on instances"
    );

    let mut results: Vec<OperationResult> = stream::iter(groups)
        .map(|(region, instance_ids)| async move {
            let client = clients.client_for(&region);
            enforce_region(&client, &instance_ids, pacing, retry, errors).await
        })
        .buffer_unordered(region_limit.max(1))
        .flat_map(stream::iter)
        .collect()
        .await;

    sort_results(&mut results);
    results
}

/// Enforce the account default in every listed region, at most `limit` at a
/// time. Results are sorted by region.
pub async fn enforce_account_defaults<R: RegionClients>(
    clients: &R,
    regions: &[String],
    limit: usize,
    retry: &RetryConfig,
    errors: &ErrorLog,
) -> Vec<OperationResult> {
    info!(regions = regions.len(), "Enforcing IMDSv2 account defaults");

    let mut results: Vec<OperationResult> = stream::iter(regions.iter().cloned())
        .map(|region| async move {
            let client = clients.client_for(&region);
            enforce_account_default(&client, retry, errors).await
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    sort_results(&mut results);
    results
}
