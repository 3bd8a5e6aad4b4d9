//! Region enumeration

use aws_sdk_ec2::types::Region;
use imdsv2_common::defaults::SCANNABLE_OPT_IN_STATUSES;
use imdsv2_common::{Component, ErrorLog};
use tracing::info;

use crate::aws::Ec2Api;

/// List the regions enabled for this account, sorted and deduplicated.
///
/// On failure the error is recorded and an empty list is returned; the caller
/// decides whether that is fatal.
pub async fn list_enabled_regions<C: Ec2Api>(client: &C, errors: &ErrorLog) -> Vec<String> {
    match client.describe_regions(false).await {
        Ok(regions) => {
            let names = enabled_region_names(&regions);
            info!(count = names.len(), "Found enabled regions");
            names
        }
        Err(err) => {
            errors.record_api_error(Component::RegionScanner, Some(client.region()), None, &err);
            Vec::new()
        }
    }
}

/// Region names whose opt-in status allows scanning.
///
/// Regions without a status are kept since the request already filtered on it.
pub fn enabled_region_names(regions: &[Region]) -> Vec<String> {
    let mut names: Vec<String> = regions
        .iter()
        .filter(|r| {
            r.opt_in_status()
                .is_none_or(|status| SCANNABLE_OPT_IN_STATUSES.contains(&status))
        })
        .filter_map(|r| r.region_name())
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str, status: Option<&str>) -> Region {
        Region::builder()
            .region_name(name)
            .set_opt_in_status(status.map(str::to_string))
            .build()
    }

    #[test]
    fn sorts_and_dedups() {
        let regions = vec![
            region("us-west-2", Some("opt-in-not-required")),
            region("eu-west-1", Some("opt-in-not-required")),
            region("us-west-2", Some("opt-in-not-required")),
        ];
        assert_eq!(enabled_region_names(&regions), vec!["eu-west-1", "us-west-2"]);
    }

    #[test]
    fn drops_regions_not_opted_in() {
        let regions = vec![
            region("us-east-1", Some("opt-in-not-required")),
            region("af-south-1", Some("not-opted-in")),
            region("ap-east-1", Some("opted-in")),
        ];
        assert_eq!(enabled_region_names(&regions), vec!["ap-east-1", "us-east-1"]);
    }

    #[test]
    fn keeps_regions_without_status() {
        let regions = vec![region("us-east-2", None)];
        assert_eq!(enabled_region_names(&regions), vec!["us-east-2"]);
    }

    #[test]
    fn skips_regions_without_name() {
        let regions = vec![Region::builder().opt_in_status("opted-in").build()];
        assert!(enabled_region_names(&regions).is_empty());
    }
}
