//! Run orchestration: preflight, discovery, scan, confirmation and mutation
//!
//! The orchestrator owns every collection produced during a run and writes
//! them into a [`RunReport`] as each phase completes.

pub mod gate;
pub mod report;
pub mod types;

pub use gate::{
    Category, ConsolePrompt, Decision, DecisionProvider, GateError, GateOutcome, GateState,
};
pub use types::{ExitStatus, RunPhase, RunReport, StopReason};

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use imdsv2_common::defaults::REQUIRED_PERMISSIONS;
use imdsv2_common::{ErrorLog, OperationResult, RemediationPlan};
use tracing::{info, warn};

use crate::aws::preflight::{PermissionCheck, check_permissions};
use crate::aws::RegionClients;
use crate::config::RunConfig;
use crate::mutation::{enforce_account_defaults, enforce_instances};
use crate::regions::list_enabled_regions;
use crate::scanner::{check_account_defaults, flatten_instances, scan_instances};

/// Drives one enforcement run against an account
pub struct Orchestrator<C, D> {
    clients: C,
    decisions: D,
    home_region: String,
    config: RunConfig,
    errors: Arc<ErrorLog>,
}

impl<C: RegionClients, D: DecisionProvider> Orchestrator<C, D> {
    pub fn new(
        clients: C,
        decisions: D,
        home_region: impl Into<String>,
        config: RunConfig,
        errors: Arc<ErrorLog>,
    ) -> Self {
        Self {
            clients,
            decisions,
            home_region: home_region.into(),
            config,
            errors,
        }
    }

    pub fn decisions(&self) -> &D {
        &self.decisions
    }

    /// Execute the run, filling `report` as phases complete.
    ///
    /// Returns an error only for fatal preconditions and gate failures;
    /// per-region and per-item failures end up in the error log.
    pub async fn run(&mut self, report: &mut RunReport) -> Result<()> {
        report.phase = RunPhase::Preflight;
        let check = self.preflight_check().await;
        if !self.handle_preflight(check)? {
            report.stop_reason = Some(StopReason::PermissionsDeclined);
            report::print_line("Exiting...");
            return Ok(());
        }

        report.phase = RunPhase::RegionDiscovery;
        let home = self.clients.client_for(&self.home_region);
        let regions = list_enabled_regions(&home, &self.errors).await;
        if regions.is_empty() {
            bail!("No enabled regions found. Cannot proceed.");
        }
        report.regions = regions;
        report::print_scan_header(report);

        report.phase = RunPhase::Scanning;
        let started = Instant::now();
        let plan = self.scan(report).await;
        report.elapsed = Some(started.elapsed());
        report::print_scan_report(report, &plan);
        report.plan = Some(plan.clone());

        if plan.is_empty() {
            report.stop_reason = Some(StopReason::NothingToDo);
            report.phase = RunPhase::Complete;
            self.finish_early(report);
            return Ok(());
        }

        report.phase = RunPhase::Confirmation;
        let outcome = gate::confirm(&plan, &mut self.decisions)
            .context("Failed to get confirmation")?;
        report.gate = Some(outcome);
        if !outcome.any_confirmed() {
            report.stop_reason = Some(StopReason::Declined);
            report.phase = RunPhase::Complete;
            report::print_line("Operation cancelled by user");
            self.finish_early(report);
            return Ok(());
        }

        report.phase = RunPhase::Mutating;
        report::print_line("\nEnabling IMDSv2 enforcement...");
        let (instance_results, default_results) = self.mutate(&plan, outcome).await;
        report.instance_results = instance_results;
        report.default_results = default_results;
        report.elapsed = Some(started.elapsed());
        report.phase = RunPhase::Complete;

        info!(
            instances = report.instance_results.len(),
            defaults = report.default_results.len(),
            errors = self.errors.count(),
            "Run complete"
        );
        report::print_final_summary(report);
        Ok(())
    }

    /// Runs that stop before mutating still list any recorded errors
    fn finish_early(&self, report: &RunReport) {
        if !self.errors.is_empty() {
            report::print_final_summary(report);
        }
    }

    async fn preflight_check(&self) -> PermissionCheck {
        let home = self.clients.client_for(&self.home_region);
        check_permissions(&home, &self.errors).await
    }

    /// Ask to continue if the preflight did not pass; `false` means stop
    fn handle_preflight(&mut self, check: PermissionCheck) -> Result<bool> {
        let detail = match check {
            PermissionCheck::Granted => return Ok(true),
            PermissionCheck::Denied { message } => format!("UnauthorizedOperation: {message}"),
            PermissionCheck::Uncertain { code, message } => format!("{code}: {message}"),
        };
        warn!(detail = %detail, "Permission preflight did not pass");
        report::print_permission_warning(&detail);

        let decision = self
            .decisions
            .decide(Category::MissingPermissions, REQUIRED_PERMISSIONS.len())
            .context("Failed to get confirmation")?;
        Ok(decision == Decision::Approve)
    }

    /// Scan instances and account defaults concurrently and build the plan
    async fn scan(&self, report: &mut RunReport) -> RemediationPlan {
        let limits = &self.config.limits;
        let (by_region, defaults) = tokio::join!(
            scan_instances(&self.clients, &report.regions, limits.instance_scans, &self.errors),
            check_account_defaults(
                &self.clients,
                &report.regions,
                limits.default_checks,
                &self.errors
            ),
        );

        let plan = RemediationPlan::build(&flatten_instances(&by_region), &defaults);
        report.instances_by_region = by_region;
        report.account_defaults = defaults;
        plan
    }

    /// Apply every confirmed category; instances and defaults run side by side
    async fn mutate(
        &self,
        plan: &RemediationPlan,
        outcome: GateOutcome,
    ) -> (Vec<OperationResult>, Vec<OperationResult>) {
        let limits = &self.config.limits;
        let retry = &self.config.retry;

        let instances = async {
            if outcome.instances.is_confirmed() {
                enforce_instances(
                    &self.clients,
                    &plan.instances_to_update,
                    limits.mutation_pacing,
                    limits.mutation_regions,
                    retry,
                    &self.errors,
                )
                .await
            } else {
                Vec::new()
            }
        };
        let defaults = async {
            if outcome.account_defaults.is_confirmed() {
                enforce_account_defaults(
                    &self.clients,
                    &plan.defaults_to_update,
                    limits.default_mutations,
                    retry,
                    &self.errors,
                )
                .await
            } else {
                Vec::new()
            }
        };

        tokio::join!(instances, defaults)
    }
}
