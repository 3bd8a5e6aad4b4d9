//! Mutation results
//!
//! Every mutation attempt produces exactly one [`OperationResult`]. The
//! success/failure discriminant is a plain `Result`, so a failed result always
//! carries an [`ApiError`] and a successful one never does.

use thiserror::Error;

/// Structured error reported by the provider API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Machine-readable error code (e.g., "UnauthorizedOperation")
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// State of an instance metadata change as reported by the provider.
///
/// Ordered by strictness: `Applied` is never a regression from `Pending`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ApplyState {
    /// Change accepted, not yet in effect
    Pending,
    /// Change is in effect
    Applied,
}

/// Outcome of a single mutation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Result of enforcing `HttpTokens=required` on one instance
    Instance {
        region: String,
        instance_id: String,
        outcome: Result<ApplyState, ApiError>,
    },
    /// Result of setting one region's account default to `required`
    AccountDefault {
        region: String,
        /// Best-effort previous value, `None` if unset or unreadable
        previous: Option<crate::TokenMode>,
        outcome: Result<(), ApiError>,
    },
}

impl OperationResult {
    pub fn region(&self) -> &str {
        match self {
            Self::Instance { region, .. } | Self::AccountDefault { region, .. } => region,
        }
    }

    /// Identifier of the mutated target: the instance ID, or the region for
    /// account defaults
    pub fn target(&self) -> &str {
        match self {
            Self::Instance { instance_id, .. } => instance_id,
            Self::AccountDefault { region, .. } => region,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Instance { outcome, .. } => outcome.is_ok(),
            Self::AccountDefault { outcome, .. } => outcome.is_ok(),
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Instance { outcome, .. } => outcome.as_ref().err(),
            Self::AccountDefault { outcome, .. } => outcome.as_ref().err(),
        }
    }

    /// Resulting apply state for successful instance mutations
    pub fn apply_state(&self) -> Option<ApplyState> {
        match self {
            Self::Instance {
                outcome: Ok(state), ..
            } => Some(*state),
            _ => None,
        }
    }

    /// One-line error detail for the final report, `None` on success
    pub fn error_detail(&self) -> Option<String> {
        let err = self.error()?;
        Some(match self {
            Self::Instance {
                region,
                instance_id,
                ..
            } => format!("{region}/{instance_id}: {err}"),
            Self::AccountDefault { region, .. } => format!("{region}: {err}"),
        })
    }
}

/// Sort results by region, then target, for deterministic reporting
pub fn sort_results(results: &mut [OperationResult]) {
    results.sort_by(|a, b| {
        a.region()
            .cmp(b.region())
            .then_with(|| a.target().cmp(b.target()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenMode;

    #[test]
    fn apply_state_ordering() {
        assert!(ApplyState::Applied > ApplyState::Pending);
        assert_eq!("applied".parse::<ApplyState>().ok(), Some(ApplyState::Applied));
        assert_eq!(ApplyState::Pending.to_string(), "pending");
    }

    #[test]
    fn api_error_display() {
        let err = ApiError::new("UnauthorizedOperation", "not allowed");
        assert_eq!(err.to_string(), "UnauthorizedOperation: not allowed");
    }

    #[test]
    fn error_detail_formats_target() {
        let failed = OperationResult::Instance {
            region: "us-west-2".to_string(),
            instance_id: "i-1".to_string(),
            outcome: Err(ApiError::new("IncorrectInstanceState", "terminated")),
        };
        assert_eq!(
            failed.error_detail().as_deref(),
            Some("us-west-2/i-1: IncorrectInstanceState: terminated")
        );

        let failed_default = OperationResult::AccountDefault {
            region: "ap-south-1".to_string(),
            previous: Some(TokenMode::Optional),
            outcome: Err(ApiError::new("Unacknowledged", "not applied")),
        };
        assert_eq!(
            failed_default.error_detail().as_deref(),
            Some("ap-south-1: Unacknowledged: not applied")
        );
    }

    #[test]
    fn success_has_no_error_detail() {
        let ok = OperationResult::Instance {
            region: "us-west-2".to_string(),
            instance_id: "i-1".to_string(),
            outcome: Ok(ApplyState::Pending),
        };
        assert!(ok.is_success());
        assert!(ok.error_detail().is_none());
        assert_eq!(ok.apply_state(), Some(ApplyState::Pending));
    }

    #[test]
    fn sort_by_region_then_target() {
        let mk = |region: &str, id: &str| OperationResult::Instance {
            region: region.to_string(),
            instance_id: id.to_string(),
            outcome: Ok(ApplyState::Applied),
        };
        let mut results = vec![mk("b", "i-1"), mk("a", "i-2"), mk("a", "i-1")];
        sort_results(&mut results);
        let keys: Vec<_> = results.iter().map(|r| (r.region(), r.target())).collect();
        assert_eq!(keys, vec![("a", "i-1"), ("a", "i-2"), ("b", "i-1")]);
    }
}
