//! Shared test utilities for ec2-enable-imdsv2
//!
//! This crate provides test helpers used by the enforcer's integration
//! tests.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection for live tests
//! - [`decisions`]: Scripted answers for the confirmation gate
//! - [`fake_ec2`]: Scripted in-memory EC2 account implementing the client seam

pub mod aws;
pub mod decisions;
pub mod fake_ec2;

// Re-export commonly used items
pub use aws::{api_error, get_test_profile, get_test_region};
pub use decisions::ScriptedDecisions;
pub use fake_ec2::{ApiCall, Call, CallKind, FakeAccount, FakeEc2, FakeInstance};
