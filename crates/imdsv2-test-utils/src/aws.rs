//! AWS test utilities
//!
//! Provides profile and region detection for live AWS tests, plus a shorthand
//! for provider errors.

use imdsv2_common::ApiError;

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Get the AWS profile for tests: `AWS_PROFILE`, else `default`
pub fn get_test_profile() -> String {
    std::env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string())
}

/// Provider error with a generated message
///
/// # Example
///
/// ```
/// use imdsv2_test_utils::aws::api_error;
///
/// let err = api_error("Throttling");
/// assert_eq!(err.code, "Throttling");
/// ```
pub fn api_error(code: &str) -> ApiError {
    ApiError::new(code, format!("{code} (scripted)"))
}
