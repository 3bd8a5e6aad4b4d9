//! Console report for the scan and the final summary
//!
//! Everything here writes to a caller-supplied writer; `print_*` wrappers
//! target stdout. Logs go to stderr, so the two never interleave.

use std::io::{self, Write};
use std::time::Duration;

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use imdsv2_common::defaults::REQUIRED_PERMISSIONS;
use imdsv2_common::token_mode::display_mode;
use imdsv2_common::{ApplyState, DefaultsStats, InstanceStats, MutationSummary, RemediationPlan};

use super::types::{RunPhase, RunReport};

const SEPARATOR: &str =
    "================================================================================";

/// Header printed before the scan starts
pub fn write_scan_header(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Scanning AWS Account using profile: {}", report.profile)?;
    if let Some(account_id) = &report.account_id {
        writeln!(out, "Account ID: {account_id}")?;
    }
    writeln!(out, "Regions: {}", report.regions.len())?;
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out)
}

/// Warning shown when the permission preflight did not pass
pub fn write_permission_warning(out: &mut impl Write, detail: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Warning: Some required permissions may be missing ({detail})")?;
    writeln!(out, "Required IAM actions:")?;
    for action in REQUIRED_PERMISSIONS {
        writeln!(out, "  - {action}")?;
    }
    writeln!(out)
}

/// Per-region instance listing
pub fn write_region_results(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    for (region, instances) in &report.instances_by_region {
        let failed = report.errors.count_for_region(region) > 0 && instances.is_empty();
        writeln!(out, "Region: {region}")?;
        if failed {
            writeln!(out, "  Scan failed, see error log")?;
        } else if instances.is_empty() {
            writeln!(out, "  No instances found")?;
        } else {
            writeln!(out, "  Found {} EC2 instance(s)", instances.len())?;
            for instance in instances {
                writeln!(out, "  {instance}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

fn defaults_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Region"),
            Cell::new("Account default HttpTokens"),
            Cell::new("IMDSv2"),
        ]);

    for record in &report.account_defaults {
        let status = if record.needs_update() {
            "not enforced"
        } else {
            "enforced"
        };
        table.add_row(vec![
            Cell::new(&record.region),
            Cell::new(display_mode(record.http_tokens.as_ref())),
            Cell::new(status),
        ]);
    }
    table
}

fn write_instance_stats(out: &mut impl Write, stats: &InstanceStats) -> io::Result<()> {
    writeln!(out, "  Total instances found: {}", stats.total)?;
    writeln!(out, "  Instances requiring IMDSv2 enforcement: {}", stats.needs_update)?;
    writeln!(out, "  Instances already compliant: {}", stats.already_compliant)?;
    if !stats.by_state.is_empty() {
        let states: Vec<String> = stats
            .by_state
            .iter()
            .map(|(state, count)| format!("{state}: {count}"))
            .collect();
        writeln!(out, "  By state: {}", states.join(", "))?;
    }
    Ok(())
}

fn write_defaults_stats(out: &mut impl Write, stats: &DefaultsStats) -> io::Result<()> {
    writeln!(
        out,
        "  Account defaults: {} region(s), {} required, {} optional, {} not set",
        stats.total, stats.required, stats.optional, stats.not_set
    )?;
    writeln!(out, "  Regions requiring a default change: {}", stats.needs_update)
}

/// Scan summary shown before the confirmation gate
pub fn write_scan_summary(
    out: &mut impl Write,
    report: &RunReport,
    plan: &RemediationPlan,
) -> io::Result<()> {
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "Scan Summary:")?;
    writeln!(out, "  Total regions scanned: {}", report.regions.len())?;
    write_instance_stats(out, &plan.instance_stats)?;
    write_defaults_stats(out, &plan.defaults_stats)?;
    writeln!(out, "  Errors encountered: {}", report.errors.count())?;
    writeln!(out)?;

    if !report.account_defaults.is_empty() {
        writeln!(out, "{}", defaults_table(report))?;
        writeln!(out)?;
    }

    if plan.is_empty() {
        writeln!(out, "All instances and account defaults already enforce IMDSv2.")?;
    }
    Ok(())
}

fn mutation_row(category: &str, summary: &MutationSummary) -> Vec<Cell> {
    let state = |s: ApplyState| summary.by_state.get(&s).copied().unwrap_or(0);
    vec![
        Cell::new(category),
        Cell::new(summary.total),
        Cell::new(summary.succeeded),
        Cell::new(summary.failed),
        Cell::new(state(ApplyState::Applied)),
        Cell::new(state(ApplyState::Pending)),
    ]
}

fn results_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Category"),
            Cell::new("Attempted"),
            Cell::new("Succeeded"),
            Cell::new("Failed"),
            Cell::new("Applied"),
            Cell::new("Pending"),
        ]);
    table.add_row(mutation_row("Instances", &report.instance_summary()));
    table.add_row(mutation_row("Account defaults", &report.default_summary()));
    table
}

fn format_elapsed(elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(d) => format!("{:.1} seconds", d.as_secs_f64()),
        None => "n/a".to_string(),
    }
}

/// Final summary, also used for partial runs
pub fn write_final_summary(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    let summary = report.summary();

    writeln!(out)?;
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "Final Summary:")?;
    if report.phase != RunPhase::Complete {
        writeln!(out, "  Run stopped during: {}", report.phase)?;
    }
    if report.gate.is_some_and(|gate| gate.any_confirmed()) {
        writeln!(out, "{}", results_table(report))?;
    }
    writeln!(out, "  Changes succeeded: {}", summary.succeeded)?;
    writeln!(out, "  Changes failed: {}", summary.failed)?;
    writeln!(out, "  Errors recorded: {}", report.errors.count())?;
    writeln!(out, "  Total time: {}", format_elapsed(report.elapsed))?;

    if !summary.error_details.is_empty() {
        writeln!(out)?;
        writeln!(out, "Detailed error log:")?;
        for detail in &summary.error_details {
            writeln!(out, "  - {detail}")?;
        }
    }

    writeln!(out)?;
    if summary.failed == 0 {
        if summary.total > 0 {
            writeln!(out, "All changes applied with IMDSv2 enforcement.")?;
        }
    } else {
        writeln!(
            out,
            "Completed with {} error(s). Review the error log above.",
            summary.failed
        )?;
    }
    Ok(())
}

fn to_stdout(f: impl FnOnce(&mut io::StdoutLock<'_>) -> io::Result<()>) {
    let mut stdout = io::stdout().lock();
    // Nothing useful can be done if stdout is gone
    let _ = f(&mut stdout).and_then(|()| stdout.flush());
}

pub fn print_scan_header(report: &RunReport) {
    to_stdout(|out| write_scan_header(out, report));
}

pub fn print_permission_warning(detail: &str) {
    to_stdout(|out| write_permission_warning(out, detail));
}

pub fn print_scan_report(report: &RunReport, plan: &RemediationPlan) {
    to_stdout(|out| {
        write_region_results(out, report)?;
        write_scan_summary(out, report, plan)
    });
}

pub fn print_final_summary(report: &RunReport) {
    to_stdout(|out| write_final_summary(out, report));
}

pub fn print_line(message: &str) {
    to_stdout(|out| writeln!(out, "{message}"));
}
