//! Scanned records
//!
//! Records are built once during the scan and never modified afterwards.
//! Compliance is always derived from the token mode on read.

use std::fmt;

use crate::token_mode::{TokenMode, display_mode, needs_update};

/// One EC2 instance and its current metadata options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    /// EC2 instance ID
    pub instance_id: String,
    /// Region the instance lives in
    pub region: String,
    /// Lifecycle state name (e.g., "running", "stopped")
    pub state: String,
    /// Current `HttpTokens` value, `None` if the instance reports no metadata options
    pub http_tokens: Option<TokenMode>,
    /// Current `HttpEndpoint` value, shown as `enabled` when unset
    pub http_endpoint: Option<String>,
    /// Value of the first `Name` tag
    pub name: Option<String>,
}

impl InstanceRecord {
    /// Whether IMDSv2 still has to be enforced on this instance
    pub fn needs_update(&self) -> bool {
        needs_update(self.http_tokens.as_ref())
    }

    /// Sort key used for deterministic output
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.region, &self.instance_id)
    }
}

impl fmt::Display for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance {}", self.instance_id)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        let status = if self.needs_update() {
            "NOT enforced"
        } else {
            "already enforced"
        };
        write!(
            f,
            " [{}]: IMDSv2 {} (HttpTokens: {}, HttpEndpoint: {})",
            self.state,
            status,
            display_mode(self.http_tokens.as_ref()),
            self.http_endpoint.as_deref().unwrap_or("enabled")
        )
    }
}

/// Account-wide metadata default for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDefaultRecord {
    pub region: String,
    /// `None` when the default was never set or could not be read
    pub http_tokens: Option<TokenMode>,
}

impl AccountDefaultRecord {
    /// Whether the region's account default still has to be set to `required`
    pub fn needs_update(&self) -> bool {
        needs_update(self.http_tokens.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(tokens: Option<TokenMode>, name: Option<&str>) -> InstanceRecord {
        InstanceRecord {
            instance_id: "i-0abc".to_string(),
            region: "us-east-1".to_string(),
            state: "running".to_string(),
            http_tokens: tokens,
            http_endpoint: Some("enabled".to_string()),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn needs_update_follows_token_mode() {
        assert!(instance(None, None).needs_update());
        assert!(instance(Some(TokenMode::Optional), None).needs_update());
        assert!(!instance(Some(TokenMode::Required), None).needs_update());
    }

    #[test]
    fn display_includes_name_and_mode() {
        let rendered = instance(Some(TokenMode::Optional), Some("web")).to_string();
        assert_eq!(
            rendered,
            "Instance i-0abc (web) [running]: IMDSv2 NOT enforced \
             (HttpTokens: optional, HttpEndpoint: enabled)"
        );
    }

    #[test]
    fn display_for_unset_mode() {
        let rendered = instance(None, None).to_string();
        assert!(rendered.ends_with("(HttpTokens: not set, HttpEndpoint: enabled)"));
    }

    #[test]
    fn display_shows_disabled_endpoint() {
        let mut record = instance(Some(TokenMode::Required), None);
        record.http_endpoint = Some("disabled".to_string());
        assert_eq!(
            record.to_string(),
            "Instance i-0abc [running]: IMDSv2 already enforced \
             (HttpTokens: required, HttpEndpoint: disabled)"
        );
    }

    #[test]
    fn account_default_compliance() {
        let record = AccountDefaultRecord {
            region: "eu-west-1".to_string(),
            http_tokens: Some(TokenMode::NoPreference),
        };
        assert!(record.needs_update());
    }
}
