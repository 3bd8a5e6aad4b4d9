//! Aggregated summaries
//!
//! Summaries are derived from result and record collections at report time;
//! nothing here is stored between phases.

use std::collections::BTreeMap;

use crate::plan::InstanceStats;
use crate::result::{ApplyState, OperationResult};

/// Counts over one collection of mutation results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful instance mutations per reported apply state
    pub by_state: BTreeMap<ApplyState, usize>,
    /// One line per failed result, in result order
    pub error_details: Vec<String>,
}

impl MutationSummary {
    pub fn from_results(results: &[OperationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };

        for result in results {
            if result.is_success() {
                summary.succeeded += 1;
                if let Some(state) = result.apply_state() {
                    *summary.by_state.entry(state).or_insert(0) += 1;
                }
            } else {
                summary.failed += 1;
            }
            if let Some(detail) = result.error_detail() {
                summary.error_details.push(detail);
            }
        }

        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Final numbers for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Mutations attempted across both categories
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Instances that needed enforcement at scan time
    pub needing_update: usize,
    /// Instances already compliant at scan time
    pub already_compliant: usize,
    /// Failed mutation details followed by every recorded error
    pub error_details: Vec<String>,
}

impl RunSummary {
    pub fn new(
        instance_stats: &InstanceStats,
        instance_results: &[OperationResult],
        default_results: &[OperationResult],
        recorded_errors: Vec<String>,
    ) -> Self {
        let instances = MutationSummary::from_results(instance_results);
        let defaults = MutationSummary::from_results(default_results);

        let mut error_details = instances.error_details;
        error_details.extend(defaults.error_details);
        error_details.extend(recorded_errors);

        Self {
            total: instances.total + defaults.total,
            succeeded: instances.succeeded + defaults.succeeded,
            failed: instances.failed + defaults.failed,
            needing_update: instance_stats.needs_update,
            already_compliant: instance_stats.already_compliant,
            error_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ApiError;

    fn instance_result(id: &str, outcome: Result<ApplyState, ApiError>) -> OperationResult {
        OperationResult::Instance {
            region: "us-east-1".to_string(),
            instance_id: id.to_string(),
            outcome,
        }
    }

    #[test]
    fn counts_by_state() {
        let results = vec![
            instance_result("i-1", Ok(ApplyState::Applied)),
            instance_result("i-2", Ok(ApplyState::Pending)),
            instance_result("i-3", Ok(ApplyState::Applied)),
            instance_result("i-4", Err(ApiError::new("Throttling", "slow down"))),
        ];

        let summary = MutationSummary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.by_state.get(&ApplyState::Applied), Some(&2));
        assert_eq!(summary.by_state.get(&ApplyState::Pending), Some(&1));
        assert_eq!(
            summary.error_details,
            vec!["us-east-1/i-4: Throttling: slow down".to_string()]
        );
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn empty_results() {
        let summary = MutationSummary::from_results(&[]);
        assert_eq!(summary, MutationSummary::default());
        assert!(summary.all_succeeded());
    }

    #[test]
    fn run_summary_combines_categories() {
        let stats = InstanceStats {
            total: 3,
            needs_update: 2,
            already_compliant: 1,
            by_state: BTreeMap::new(),
        };
        let instances = vec![
            instance_result("i-1", Ok(ApplyState::Applied)),
            instance_result("i-2", Err(ApiError::new("AccessDenied", "no"))),
        ];
        let defaults = vec![OperationResult::AccountDefault {
            region: "eu-west-1".to_string(),
            previous: None,
            outcome: Ok(()),
        }];

        let summary = RunSummary::new(&stats, &instances, &defaults, vec!["recorded".to_string()]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.needing_update, 2);
        assert_eq!(summary.already_compliant, 1);
        assert_eq!(
            summary.error_details,
            vec![
                "us-east-1/i-2: AccessDenied: no".to_string(),
                "recorded".to_string()
            ]
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn succeeded_plus_failed_is_total(
                outcomes in prop::collection::vec(any::<(bool, bool)>(), 0..50)
            ) {
                let results: Vec<_> = outcomes
                    .iter()
                    .enumerate()
                    .map(|(i, (ok, instance))| {
                        let err = ApiError::new("InternalError", "simulated");
                        if *instance {
                            instance_result(
                                &format!("i-{i}"),
                                if *ok { Ok(ApplyState::Applied) } else { Err(err) },
                            )
                        } else {
                            OperationResult::AccountDefault {
                                region: format!("r-{i}"),
                                previous: None,
                                outcome: if *ok { Ok(()) } else { Err(err) },
                            }
                        }
                    })
                    .collect();

                let summary = MutationSummary::from_results(&results);
                prop_assert_eq!(summary.succeeded + summary.failed, summary.total);
                prop_assert_eq!(summary.total, results.len());
                prop_assert_eq!(summary.error_details.len(), summary.failed);
            }
        }
    }
}
