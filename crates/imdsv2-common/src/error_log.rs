//! Run-scoped error log
//!
//! Every component that talks to the provider records failures here instead
//! of propagating them. The log is created by the orchestrator at the start of
//! a run and shared through an `Arc`; appends from concurrent workers are
//! serialised by a mutex.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::warn;

/// Component that produced an error record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Component {
    /// Credential / permission checks before the scan
    PermissionCheck,
    /// Region enumeration
    RegionScanner,
    /// Per-region instance listing
    InstanceScanner,
    /// Account default reads
    AccountDefaults,
    /// Per-instance metadata changes
    InstanceModifier,
    /// Account default changes
    DefaultsModifier,
    /// Errors caught by the orchestrator itself
    Orchestrator,
}

/// A single recorded failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub component: Component,
    pub region: Option<String>,
    pub resource_id: Option<String>,
    /// Error code or error type name
    pub kind: String,
    pub message: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.component)?;
        if let Some(region) = &self.region {
            write!(f, " - Region: {region}")?;
        }
        if let Some(resource_id) = &self.resource_id {
            write!(f, " - Instance: {resource_id}")?;
        }
        write!(f, " - {}: {}", self.kind, self.message)
    }
}

/// Append-only, thread-safe error log for one run
#[derive(Debug, Default)]
pub struct ErrorLog {
    records: Mutex<Vec<ErrorRecord>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the Vec half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<ErrorRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failure and emit it as a warning
    pub fn record(
        &self,
        component: Component,
        region: Option<&str>,
        resource_id: Option<&str>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) {
        let record = ErrorRecord {
            timestamp: Utc::now(),
            component,
            region: region.map(str::to_string),
            resource_id: resource_id.map(str::to_string),
            kind: kind.into(),
            message: message.into(),
        };

        warn!(
            component = %record.component,
            region = ?record.region,
            resource_id = ?record.resource_id,
            kind = %record.kind,
            "{}",
            record.message
        );

        self.lock().push(record);
    }

    /// Record a structured provider error
    pub fn record_api_error(
        &self,
        component: Component,
        region: Option<&str>,
        resource_id: Option<&str>,
        error: &crate::ApiError,
    ) {
        self.record(
            component,
            region,
            resource_id,
            error.code.as_str(),
            error.message.as_str(),
        );
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of all records in insertion order
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.lock().clone()
    }

    /// Formatted records for the final report
    pub fn summary(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    /// Formatted records whose component is not in `excluded`
    pub fn summary_excluding(&self, excluded: &[Component]) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| !excluded.contains(&r.component))
            .map(ToString::to_string)
            .collect()
    }

    /// Records attributed to one region
    pub fn count_for_region(&self, region: &str) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.region.as_deref() == Some(region))
            .count()
    }

    /// Clear all records. Only meant for isolating tests that share a log.
    pub fn reset(&self) {
        self.lock().clear();
    }
}
