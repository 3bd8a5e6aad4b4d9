//! imdsv2-enforcer - IMDSv2 enforcement across every enabled region
//!
//! Scans all instances and account-level metadata defaults of one AWS
//! account, asks the operator for confirmation and sets `HttpTokens=required`
//! where it is not yet enforced.

pub mod aws;
pub mod config;
pub mod logging;
pub mod mutation;
pub mod orchestrator;
pub mod regions;
pub mod scanner;
