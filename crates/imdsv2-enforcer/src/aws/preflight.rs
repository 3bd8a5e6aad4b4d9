//! Dry-run permission check before any scan

use imdsv2_common::{Component, ErrorLog};
use tracing::{debug, warn};

use super::ec2::Ec2Api;
use super::error::{AwsError, classify_api_error};

/// Outcome of the permission preflight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    /// The dry run reported the call would have succeeded
    Granted,
    /// The caller is explicitly not authorized
    Denied { message: String },
    /// The check itself failed for another reason
    Uncertain { code: String, message: String },
}

impl PermissionCheck {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionCheck::Granted)
    }
}

/// Issue `DescribeRegions` with `DryRun=true` against the home region.
///
/// A dry run never returns success: `DryRunOperation` means the call is
/// permitted. Failures other than an authorization denial are recorded.
pub async fn check_permissions<C: Ec2Api>(client: &C, errors: &ErrorLog) -> PermissionCheck {
    let err = match client.describe_regions(true).await {
        Ok(_) => {
            debug!(region = client.region(), "Dry run returned success");
            return PermissionCheck::Granted;
        }
        Err(err) => err,
    };

    match classify_api_error(&err) {
        AwsError::DryRunSucceeded => {
            debug!(region = client.region(), "Permission preflight passed");
            PermissionCheck::Granted
        }
        AwsError::Unauthorized { message } => {
            warn!(region = client.region(), "Missing permission for DescribeRegions");
            PermissionCheck::Denied { message }
        }
        _ => {
            errors.record_api_error(
                Component::PermissionCheck,
                Some(client.region()),
                None,
                &err,
            );
            PermissionCheck::Uncertain {
                code: err.code,
                message: err.message,
            }
        }
    }
}
