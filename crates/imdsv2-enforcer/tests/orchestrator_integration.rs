//! End-to-end runs of the orchestrator over the scripted EC2 fake

use std::sync::Arc;
use std::time::Duration;

use imdsv2_common::{ErrorLog, TokenMode};
use imdsv2_enforcer::config::{RetryConfig, RunConfig};
use imdsv2_enforcer::orchestrator::report::write_final_summary;
use imdsv2_enforcer::orchestrator::{
    Category, Decision, ExitStatus, GateState, Orchestrator, RunPhase, RunReport, StopReason,
};
use imdsv2_test_utils::{CallKind, FakeAccount, FakeInstance, ScriptedDecisions, api_error};

const HOME: &str = "us-east-1";

fn config() -> RunConfig {
    let mut config = RunConfig::new("test");
    config.limits.mutation_pacing = Duration::from_millis(1);
    config.retry = RetryConfig::disabled();
    config
}

fn orchestrator(
    account: &FakeAccount,
    decisions: ScriptedDecisions,
) -> (Orchestrator<FakeAccount, ScriptedDecisions>, RunReport) {
    let errors = Arc::new(ErrorLog::new());
    let report = RunReport::new("test", Arc::clone(&errors));
    let orchestrator = Orchestrator::new(account.clone(), decisions, HOME, config(), errors);
    (orchestrator, report)
}

fn mixed_account() -> FakeAccount {
    let account = FakeAccount::with_regions(&[HOME, "eu-west-1"]);
    account
        .add_instance(HOME, FakeInstance::new("i-1").name("web"))
        .add_instance(HOME, FakeInstance::new("i-2").required())
        .add_instance("eu-west-1", FakeInstance::new("i-3").tokens(None))
        .set_default(HOME, Some(TokenMode::Required))
        .set_default("eu-west-1", Some(TokenMode::Optional));
    account
}

fn final_summary(report: &RunReport) -> String {
    let mut out = Vec::new();
    write_final_summary(&mut out, report).unwrap();
    String::from_utf8(out).unwrap()
}

fn modify_calls(account: &FakeAccount) -> (usize, usize) {
    (
        account.count_calls(|c| matches!(c, CallKind::ModifyInstance { .. })),
        account.count_calls(|c| matches!(c, CallKind::ModifyDefaults)),
    )
}

#[tokio::test]
async fn full_run_enforces_everything() {
    let account = mixed_account();
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::approve_all());

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.phase, RunPhase::Complete);
    assert_eq!(report.regions, vec!["eu-west-1".to_string(), HOME.to_string()]);
    assert_eq!(report.instance_results.len(), 2);
    assert_eq!(report.default_results.len(), 1);
    assert_eq!(report.exit_status(), ExitStatus::Success);
    assert!(report.elapsed.is_some());
    assert_eq!(
        orch.decisions().asked(),
        &[(Category::Instances, 2), (Category::AccountDefaults, 1)]
    );

    assert_eq!(account.instance_tokens(HOME, "i-1"), Some(TokenMode::Required));
    assert_eq!(account.instance_tokens("eu-west-1", "i-3"), Some(TokenMode::Required));
    assert_eq!(account.default_tokens("eu-west-1"), Some(TokenMode::Required));

    let summary = report.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.needing_update, 2);
    assert_eq!(summary.already_compliant, 1);
}

#[tokio::test]
async fn scenario_c_declined_instances_accepted_defaults() {
    let account = mixed_account();
    account.fail_defaults_write("eu-west-1", api_error("AccessDenied"));
    let decisions = ScriptedDecisions::new()
        .answer(Category::Instances, Decision::Decline)
        .answer(Category::AccountDefaults, Decision::Approve);
    let (mut orch, mut report) = orchestrator(&account, decisions);

    orch.run(&mut report).await.unwrap();

    let gate = report.gate.unwrap();
    assert_eq!(gate.instances, GateState::Declined);
    assert_eq!(gate.account_defaults, GateState::Confirmed);
    assert_eq!(modify_calls(&account), (0, 1));
    assert!(report.instance_results.is_empty());
    assert_eq!(report.exit_status(), ExitStatus::Failure);
}

#[tokio::test]
async fn scenario_c_succeeds_when_defaults_succeed() {
    let account = mixed_account();
    let decisions = ScriptedDecisions::new()
        .answer(Category::Instances, Decision::Decline)
        .answer(Category::AccountDefaults, Decision::Approve);
    let (mut orch, mut report) = orchestrator(&account, decisions);

    orch.run(&mut report).await.unwrap();

    assert_eq!(modify_calls(&account), (0, 1));
    assert_eq!(report.exit_status(), ExitStatus::Success);
}

#[tokio::test]
async fn declining_everything_mutates_nothing() {
    let account = mixed_account();
    let decisions = ScriptedDecisions::new()
        .answer(Category::Instances, Decision::Decline)
        .answer(Category::AccountDefaults, Decision::Decline);
    let (mut orch, mut report) = orchestrator(&account, decisions);

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::Declined));
    assert_eq!(modify_calls(&account), (0, 0));
    assert_eq!(report.exit_status(), ExitStatus::Success);
}

#[tokio::test]
async fn compliant_account_skips_the_gate() {
    let account = FakeAccount::with_regions(&[HOME]);
    account
        .add_instance(HOME, FakeInstance::new("i-1").required())
        .set_default(HOME, Some(TokenMode::Required));
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::new());

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::NothingToDo));
    assert!(orch.decisions().asked().is_empty());
    assert_eq!(modify_calls(&account), (0, 0));
    assert_eq!(report.exit_status(), ExitStatus::Success);
}

#[tokio::test]
async fn scan_errors_do_not_fail_the_run() {
    let account = mixed_account();
    account.fail_scan("eu-west-1", 0, api_error("InternalError"));
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::approve_all());

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.instance_results.len(), 1);
    assert_eq!(report.errors.count(), 1);
    assert_eq!(report.exit_status(), ExitStatus::Success);
    assert_eq!(report.summary().error_details.len(), 1);
}

#[tokio::test]
async fn no_regions_is_fatal() {
    let account = FakeAccount::with_regions(&[HOME]);
    account.fail_describe_regions(api_error("AuthFailure"));
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::approve_all());

    let err = orch.run(&mut report).await.unwrap_err();

    assert!(err.to_string().contains("No enabled regions"));
    assert_eq!(report.phase, RunPhase::RegionDiscovery);
    assert_eq!(report.errors.count(), 1);
}

#[tokio::test]
async fn missing_permissions_can_be_declined() {
    let account = mixed_account();
    account.set_dry_run_error(api_error("UnauthorizedOperation"));
    let decisions =
        ScriptedDecisions::new().answer(Category::MissingPermissions, Decision::Decline);
    let (mut orch, mut report) = orchestrator(&account, decisions);

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::PermissionsDeclined));
    assert_eq!(
        account.count_calls(|c| matches!(c, CallKind::DescribeInstances { .. })),
        0
    );
    assert_eq!(report.exit_status(), ExitStatus::Success);
}

#[tokio::test]
async fn missing_permissions_can_be_overridden() {
    let account = mixed_account();
    account.set_dry_run_error(api_error("UnauthorizedOperation"));
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::approve_all());

    orch.run(&mut report).await.unwrap();

    assert_eq!(orch.decisions().asked()[0].0, Category::MissingPermissions);
    assert_eq!(report.phase, RunPhase::Complete);
}

#[tokio::test]
async fn closed_input_at_the_gate_is_an_error() {
    let account = mixed_account();
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::new());

    let err = orch.run(&mut report).await.unwrap_err();

    assert!(err.to_string().contains("confirmation"));
    assert_eq!(report.phase, RunPhase::Confirmation);
    assert!(report.plan.is_some());
    assert_eq!(modify_calls(&account), (0, 0));
}

#[tokio::test]
async fn compliant_run_still_reports_scan_errors() {
    let account = FakeAccount::with_regions(&[HOME, "eu-west-1"]);
    account
        .add_instance(HOME, FakeInstance::new("i-1").required())
        .add_instance("eu-west-1", FakeInstance::new("i-2").required())
        .set_default(HOME, Some(TokenMode::Required))
        .set_default("eu-west-1", Some(TokenMode::Required))
        .fail_scan("eu-west-1", 0, api_error("InternalError"));
    let (mut orch, mut report) = orchestrator(&account, ScriptedDecisions::new());

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::NothingToDo));
    let text = final_summary(&report);
    assert!(text.contains("Errors recorded: 1"));
    assert!(text.contains("Detailed error log:"));
    assert!(text.contains(
        "  - [instance_scanner] - Region: eu-west-1 - InternalError: InternalError (scripted)"
    ));
    assert!(!text.contains("Attempted"));
}

#[tokio::test]
async fn declined_run_still_reports_default_read_errors() {
    let account = mixed_account();
    account.fail_defaults_read("eu-west-1", api_error("UnauthorizedOperation"));
    let decisions = ScriptedDecisions::new()
        .answer(Category::Instances, Decision::Decline)
        .answer(Category::AccountDefaults, Decision::Decline);
    let (mut orch, mut report) = orchestrator(&account, decisions);

    orch.run(&mut report).await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::Declined));
    let text = final_summary(&report);
    assert!(text.contains("[account_defaults] - Region: eu-west-1 - UnauthorizedOperation"));
    assert_eq!(report.exit_status(), ExitStatus::Success);
}
