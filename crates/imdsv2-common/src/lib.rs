//! imdsv2-common - Shared types for IMDSv2 enforcement
//!
//! This crate holds the domain model of the enforcer without any AWS SDK
//! dependency, so planning and summarising can be tested in isolation.
//!
//! ## Modules
//!
//! - [`defaults`]: Concurrency limits, pacing and other tuning constants
//! - [`error_log`]: Append-only, thread-safe log of failures for one run
//! - [`plan`]: Statistics and the remediation plan derived from scan records
//! - [`records`]: Scanned instance and account-default records
//! - [`result`]: Mutation results and provider errors
//! - [`summary`]: Aggregated mutation and run summaries
//! - [`token_mode`]: The `HttpTokens` setting and the compliance predicate

pub mod defaults;
pub mod error_log;
pub mod plan;
pub mod records;
pub mod result;
pub mod summary;
pub mod token_mode;

// Re-export commonly used types
pub use error_log::{Component, ErrorLog, ErrorRecord};
pub use plan::{DefaultsStats, InstanceStats, RemediationPlan};
pub use records::{AccountDefaultRecord, InstanceRecord};
pub use result::{ApiError, ApplyState, OperationResult};
pub use summary::{MutationSummary, RunSummary};
pub use token_mode::{TokenMode, needs_update};
