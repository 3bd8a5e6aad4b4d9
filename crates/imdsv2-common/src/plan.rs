//! Remediation planning
//!
//! Pure functions over scanned records. The [`RemediationPlan`] built here is
//! the single source for both the counts shown at the confirmation prompt and
//! the items handed to the mutation engine, so the two can never disagree.

use std::collections::BTreeMap;

use crate::records::{AccountDefaultRecord, InstanceRecord};
use crate::token_mode::TokenMode;

/// Summary statistics over scanned instances
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceStats {
    pub total: usize,
    pub needs_update: usize,
    pub already_compliant: usize,
    /// Instance count per lifecycle state
    pub by_state: BTreeMap<String, usize>,
}

/// Summary statistics over account defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultsStats {
    pub total: usize,
    pub required: usize,
    pub optional: usize,
    /// Absent or explicitly `no-preference`
    pub not_set: usize,
    pub needs_update: usize,
}

pub fn summarize_instances(instances: &[InstanceRecord]) -> InstanceStats {
    let mut by_state = BTreeMap::new();
    for instance in instances {
        *by_state.entry(instance.state.clone()).or_insert(0) += 1;
    }

    let needs_update = instances.iter().filter(|i| i.needs_update()).count();

    InstanceStats {
        total: instances.len(),
        needs_update,
        already_compliant: instances.len() - needs_update,
        by_state,
    }
}

pub fn summarize_defaults(defaults: &[AccountDefaultRecord]) -> DefaultsStats {
    let mut stats = DefaultsStats {
        total: defaults.len(),
        ..Default::default()
    };

    for record in defaults {
        match &record.http_tokens {
            Some(TokenMode::Required) => stats.required += 1,
            Some(TokenMode::Optional) => stats.optional += 1,
            None | Some(TokenMode::NoPreference) => stats.not_set += 1,
            // Unrecognised values are neither optional nor unset, but still
            // non-compliant.
            Some(TokenMode::Other(_)) => {}
        }
        if record.needs_update() {
            stats.needs_update += 1;
        }
    }

    stats
}

/// Instances that still need IMDSv2 enforcement
pub fn filter_needs_update(instances: &[InstanceRecord]) -> Vec<InstanceRecord> {
    instances
        .iter()
        .filter(|i| i.needs_update())
        .cloned()
        .collect()
}

/// Split instances into (needs update, already compliant), preserving order
pub fn partition_instances(
    instances: &[InstanceRecord],
) -> (Vec<InstanceRecord>, Vec<InstanceRecord>) {
    instances.iter().cloned().partition(InstanceRecord::needs_update)
}

/// Regions whose account default is not yet `required`
pub fn defaults_needing_update(defaults: &[AccountDefaultRecord]) -> Vec<String> {
    defaults
        .iter()
        .filter(|d| d.needs_update())
        .map(|d| d.region.clone())
        .collect()
}

/// What the scan found and what would be changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationPlan {
    pub instance_stats: InstanceStats,
    pub defaults_stats: DefaultsStats,
    /// Instances to enforce, sorted by (region, instance ID)
    pub instances_to_update: Vec<InstanceRecord>,
    /// Regions whose account default should be set, sorted
    pub defaults_to_update: Vec<String>,
}

impl RemediationPlan {
    /// Build the plan from scan output. Inputs are expected to be sorted; the
    /// plan keeps their order.
    pub fn build(instances: &[InstanceRecord], defaults: &[AccountDefaultRecord]) -> Self {
        Self {
            instance_stats: summarize_instances(instances),
            defaults_stats: summarize_defaults(defaults),
            instances_to_update: filter_needs_update(instances),
            defaults_to_update: defaults_needing_update(defaults),
        }
    }

    /// True when neither instances nor account defaults need changes
    pub fn is_empty(&self) -> bool {
        self.instances_to_update.is_empty() && self.defaults_to_update.is_empty()
    }
}
