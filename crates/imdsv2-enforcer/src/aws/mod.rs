//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - EC2: Regions, instances, metadata options and account defaults
//! - STS: Credential validation and account ID lookup
//! - preflight: Dry-run permission check before scanning

pub mod account;
pub mod context;
pub mod ec2;
pub mod error;
pub mod preflight;

pub use account::{AccountId, get_current_account_id};
pub use context::AwsContext;
pub use ec2::{Ec2Api, Ec2Client, InstancePage, RegionClients};
pub use error::{AwsError, api_error_from_sdk, classify_api_error};
