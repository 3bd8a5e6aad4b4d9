//! AWS account validation and identity

use anyhow::{Context, Result};
use tracing::info;

use super::error::{api_error_from_sdk, classify_api_error};

/// Strongly-typed AWS account ID (12-digit string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, derive_more::Deref)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Self {
        AccountId(s.into())
    }
}

/// Fetch the current AWS account ID via STS GetCallerIdentity
///
/// This call requires no permissions and succeeds whenever the credentials
/// are valid, so it doubles as the credential check at the start of a run.
pub async fn get_current_account_id(config: &aws_config::SdkConfig) -> Result<AccountId> {
    let sts = aws_sdk_sts::Client::new(config);
    let identity = match sts.get_caller_identity().send().await {
        Ok(identity) => identity,
        Err(e) => {
            let err = api_error_from_sdk(e);
            let hint = classify_api_error(&err)
                .suggestion()
                .map(|s| format!(" ({s})"))
                .unwrap_or_default();
            anyhow::bail!("Failed to validate AWS credentials: {err}{hint}");
        }
    };

    let account = identity
        .account()
        .context("No account ID returned from STS GetCallerIdentity")?;

    info!(account_id = %account, arn = ?identity.arn(), "AWS credentials validated");

    Ok(AccountId(account.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_display_and_deref() {
        let id = AccountId::new("123456789012");
        assert_eq!(id.to_string(), "123456789012");
        assert_eq!(id.len(), 12);
    }
}
