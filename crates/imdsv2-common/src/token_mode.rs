//! The IMDS `HttpTokens` setting
//!
//! Instances report `required` or `optional`; account defaults can also be
//! `no-preference`. Values the provider may add later are kept verbatim in
//! [`TokenMode::Other`] so they show up in reports instead of being dropped.

use std::fmt;

/// Metadata token mode of an instance or an account default
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenMode {
    /// Session tokens are mandatory (IMDSv2 only)
    Required,
    /// Both IMDSv1 and IMDSv2 are accepted
    Optional,
    /// Account default defers to the AMI / launch settings
    NoPreference,
    /// Unrecognised value returned by the provider
    Other(String),
}

impl TokenMode {
    /// Parse a provider value. Never fails; unknown strings become `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "required" => Self::Required,
            "optional" => Self::Optional,
            "no-preference" => Self::NoPreference,
            other => Self::Other(other.to_string()),
        }
    }

    /// The provider spelling of this mode
    pub fn as_str(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::NoPreference => "no-preference",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance predicate shared by instances and account defaults.
///
/// Anything other than `required` needs remediation, including an absent
/// value.
pub fn needs_update(mode: Option<&TokenMode>) -> bool {
    !matches!(mode, Some(TokenMode::Required))
}

/// Render an optional mode the way reports show it
pub fn display_mode(mode: Option<&TokenMode>) -> &str {
    mode.map_or("not set", TokenMode::as_str)
}
