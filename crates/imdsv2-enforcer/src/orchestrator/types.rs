//! Run state collected by the orchestrator
//!
//! `RunReport` is filled in phase by phase so that a run that stops early
//! (fatal error, panic) can still print what it got through.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use imdsv2_common::{
    AccountDefaultRecord, ErrorLog, InstanceRecord, MutationSummary, OperationResult,
    RemediationPlan, RunSummary,
};

use super::gate::GateOutcome;
use crate::aws::AccountId;
use crate::mutation::MUTATION_COMPONENTS;

/// Last phase a run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunPhase {
    Starting,
    Preflight,
    RegionDiscovery,
    Scanning,
    Confirmation,
    Mutating,
    Complete,
}

/// Why the run ended without mutating anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator declined to continue without full permissions
    PermissionsDeclined,
    /// Everything already enforces IMDSv2
    NothingToDo,
    /// Operator declined every pending category
    Declined,
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    Interrupted,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
            ExitStatus::Interrupted => 130,
        }
    }
}

/// Everything a run has produced so far
#[derive(Debug)]
pub struct RunReport {
    pub profile: String,
    pub account_id: Option<AccountId>,
    pub phase: RunPhase,
    pub stop_reason: Option<StopReason>,
    pub regions: Vec<String>,
    pub instances_by_region: BTreeMap<String, Vec<InstanceRecord>>,
    pub account_defaults: Vec<AccountDefaultRecord>,
    pub plan: Option<RemediationPlan>,
    pub gate: Option<GateOutcome>,
    pub instance_results: Vec<OperationResult>,
    pub default_results: Vec<OperationResult>,
    /// Wall clock from the start of the scan to the end of mutation
    pub elapsed: Option<Duration>,
    pub errors: Arc<ErrorLog>,
}

impl RunReport {
    pub fn new(profile: impl Into<String>, errors: Arc<ErrorLog>) -> Self {
        Self {
            profile: profile.into(),
            account_id: None,
            phase: RunPhase::Starting,
            stop_reason: None,
            regions: Vec::new(),
            instances_by_region: BTreeMap::new(),
            account_defaults: Vec::new(),
            plan: None,
            gate: None,
            instance_results: Vec::new(),
            default_results: Vec::new(),
            elapsed: None,
            errors,
        }
    }

    pub fn instance_summary(&self) -> MutationSummary {
        MutationSummary::from_results(&self.instance_results)
    }

    pub fn default_summary(&self) -> MutationSummary {
        MutationSummary::from_results(&self.default_results)
    }

    /// Final numbers. Mutation failures are listed once, from their results;
    /// every other recorded error follows.
    pub fn summary(&self) -> RunSummary {
        let stats = self
            .plan
            .as_ref()
            .map(|p| p.instance_stats.clone())
            .unwrap_or_default();
        RunSummary::new(
            &stats,
            &self.instance_results,
            &self.default_results,
            self.errors.summary_excluding(MUTATION_COMPONENTS),
        )
    }

    pub fn any_mutation_failed(&self) -> bool {
        self.instance_results
            .iter()
            .chain(&self.default_results)
            .any(|r| !r.is_success())
    }

    /// Exit status of a run that returned normally
    pub fn exit_status(&self) -> ExitStatus {
        if self.any_mutation_failed() {
            ExitStatus::Failure
        } else {
            ExitStatus::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imdsv2_common::{ApiError, ApplyState, Component};

    fn report() -> RunReport {
        RunReport::new("test", Arc::new(ErrorLog::new()))
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert_eq!(ExitStatus::Interrupted.code(), 130);
    }

    #[test]
    fn empty_run_succeeds() {
        let report = report();
        assert_eq!(report.exit_status(), ExitStatus::Success);
        assert_eq!(report.summary().total, 0);
    }

    #[test]
    fn any_failure_fails_the_run() {
        let mut report = report();
        report.instance_results.push(OperationResult::Instance {
            region: "us-east-1".to_string(),
            instance_id: "i-1".to_string(),
            outcome: Ok(ApplyState::Applied),
        });
        report.default_results.push(OperationResult::AccountDefault {
            region: "us-east-1".to_string(),
            previous: None,
            outcome: Err(ApiError::new("Unacknowledged", "returned false")),
        });
        assert_eq!(report.exit_status(), ExitStatus::Failure);
    }

    #[test]
    fn summary_lists_mutation_failures_once() {
        let mut report = report();
        let err = ApiError::new("AccessDenied", "no");
        report.errors.record_api_error(
            Component::InstanceModifier,
            Some("us-east-1"),
            Some("i-1"),
            &err,
        );
        report
            .errors
            .record(Component::InstanceScanner, Some("eu-west-1"), None, "Throttling", "slow");
        report.instance_results.push(OperationResult::Instance {
            region: "us-east-1".to_string(),
            instance_id: "i-1".to_string(),
            outcome: Err(err),
        });

        let summary = report.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.error_details,
            vec![
                "us-east-1/i-1: AccessDenied: no".to_string(),
                "[instance_scanner] - Region: eu-west-1 - Throttling: slow".to_string(),
            ]
        );
    }
}
