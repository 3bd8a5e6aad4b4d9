//! AWS error conversion and classification
//!
//! SDK errors are flattened into [`ApiError`] (code + message) at the client
//! boundary using `ProvideErrorMetadata`, then classified by code for retry
//! decisions and operator hints.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use imdsv2_common::ApiError;
use thiserror::Error;

/// AWS error categories for retry and reporting logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Caller lacks the IAM permission for this action
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    /// Region is not enabled for this account
    #[error("Region requires opt-in")]
    OptInRequired,

    /// Dry-run request would have succeeded
    #[error("Dry run succeeded")]
    DryRunSucceeded,

    /// Credentials were rejected
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { code: String, message: String },

    /// Target instance no longer exists
    #[error("Instance not found: {message}")]
    NotFound { message: String },

    /// Request never reached the service (network, timeout)
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Generic AWS error with code and message
    #[error("AWS error: {message}")]
    Sdk { code: String, message: String },
}

impl AwsError {
    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(self, AwsError::Throttled)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AwsError::Unauthorized { .. })
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        let code = match self {
            AwsError::Throttled => "Throttling",
            AwsError::Unauthorized { .. } => "UnauthorizedOperation",
            AwsError::OptInRequired => "OptInRequired",
            AwsError::InvalidCredentials { code, .. } | AwsError::Sdk { code, .. } => code.as_str(),
            AwsError::DryRunSucceeded | AwsError::NotFound { .. } | AwsError::Transport { .. } => {
                return None;
            }
        };
        suggestion_for_code(code)
    }
}

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Known AWS error codes for missing permissions
const UNAUTHORIZED_CODES: &[&str] = &[
    "UnauthorizedOperation",
    "AccessDenied",
    "AccessDeniedException",
];

/// Known AWS error codes for rejected credentials
const CREDENTIAL_CODES: &[&str] = &[
    "AuthFailure",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "ExpiredTokenException",
];

/// Known AWS error codes for instances that disappeared between scan and mutate
const NOT_FOUND_CODES: &[&str] = &["InvalidInstanceID.NotFound", "InvalidInstanceID.Malformed"];

/// Codes synthesised by [`api_error_from_sdk`] for errors without a service response
const TRANSPORT_CODES: &[&str] = &[
    "DispatchFailure",
    "TimeoutError",
    "ResponseError",
    "ConstructionFailure",
];

/// Classify a provider error by its code.
pub fn classify_api_error(error: &ApiError) -> AwsError {
    let code = error.code.as_str();
    let message = error.message.clone();

    match code {
        c if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        c if UNAUTHORIZED_CODES.contains(&c) => AwsError::Unauthorized { message },
        c if CREDENTIAL_CODES.contains(&c) => AwsError::InvalidCredentials {
            code: c.to_string(),
            message,
        },
        c if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        c if TRANSPORT_CODES.contains(&c) => AwsError::Transport { message },
        "OptInRequired" => AwsError::OptInRequired,
        "DryRunOperation" => AwsError::DryRunSucceeded,
        _ => AwsError::Sdk {
            code: code.to_string(),
            message,
        },
    }
}

/// Convert an SDK error into a structured [`ApiError`].
///
/// Service errors keep their AWS code and message. Errors that never got a
/// service response are labelled with the SDK failure kind.
pub fn api_error_from_sdk<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let fallback_code = match &err {
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        SdkError::TimeoutError(_) => "TimeoutError",
        SdkError::DispatchFailure(_) => "DispatchFailure",
        SdkError::ResponseError(_) => "ResponseError",
        _ => "Unknown",
    };

    let code = err.code().unwrap_or(fallback_code).to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    ApiError::new(code, message)
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "UnauthorizedOperation",
        "Grant the IAM action named in the message to this profile.",
    ),
    (
        "AccessDenied",
        "Grant the IAM action named in the message to this profile.",
    ),
    (
        "OptInRequired",
        "Enable the region for this account before scanning it.",
    ),
    (
        "InvalidClientTokenId",
        "Check that your access key is correct.",
    ),
    (
        "SignatureDoesNotMatch",
        "Check that your secret key is correct.",
    ),
    (
        "ExpiredToken",
        "Refresh the session credentials for this profile.",
    ),
    (
        "AuthFailure",
        "Check the credentials configured for this profile.",
    ),
    (
        "Throttling",
        "AWS API rate limit hit. Re-run the tool; enforcement is idempotent.",
    ),
    (
        "RequestLimitExceeded",
        "AWS API rate limit hit. Re-run the tool; enforcement is idempotent.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: &str) -> ApiError {
        ApiError::new(code, "some message")
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_api_error(&api(code));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
            assert!(matches!(err, AwsError::Throttled));
        }
    }

    #[test]
    fn unauthorized_codes() {
        for code in UNAUTHORIZED_CODES {
            let err = classify_api_error(&api(code));
            assert!(err.is_unauthorized(), "Expected Unauthorized for code: {code}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn credential_codes() {
        for code in CREDENTIAL_CODES {
            assert!(
                matches!(
                    classify_api_error(&api(code)),
                    AwsError::InvalidCredentials { .. }
                ),
                "Expected InvalidCredentials for code: {code}"
            );
        }
    }

    #[test]
    fn special_codes() {
        assert!(matches!(
            classify_api_error(&api("DryRunOperation")),
            AwsError::DryRunSucceeded
        ));
        assert!(matches!(
            classify_api_error(&api("OptInRequired")),
            AwsError::OptInRequired
        ));
        assert!(matches!(
            classify_api_error(&api("InvalidInstanceID.NotFound")),
            AwsError::NotFound { .. }
        ));
        assert!(matches!(
            classify_api_error(&api("DispatchFailure")),
            AwsError::Transport { .. }
        ));
    }

    #[test]
    fn unknown_code_is_generic() {
        let err = classify_api_error(&api("SomeNewError"));
        assert!(matches!(err, AwsError::Sdk { ref code, .. } if code == "SomeNewError"));
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn suggestions_for_known_codes() {
        for (code, _) in SUGGESTIONS {
            assert!(
                suggestion_for_code(code).is_some(),
                "No suggestion for code: {code}"
            );
        }
        assert!(suggestion_for_code("SomeUnknownCode").is_none());
        assert!(classify_api_error(&api("SignatureDoesNotMatch")).suggestion().is_some());
    }
}
