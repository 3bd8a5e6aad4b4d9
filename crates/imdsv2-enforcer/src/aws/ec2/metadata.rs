//! Instance metadata options and account-level metadata defaults

use super::Ec2Client;
use crate::aws::error::api_error_from_sdk;
use aws_sdk_ec2::types::{
    HttpTokensState, InstanceMetadataOptionsState, MetadataDefaultHttpTokensState,
};
use imdsv2_common::{ApiError, ApplyState, TokenMode};
use tracing::{debug, info};

impl Ec2Client {
    /// Read the account-level `HttpTokens` default of this client's region
    pub(super) async fn account_metadata_defaults(&self) -> Result<Option<TokenMode>, ApiError> {
        let response = self
            .client
            .get_instance_metadata_defaults()
            .send()
            .await
            .map_err(api_error_from_sdk)?;

        let tokens = response
            .account_level()
            .and_then(|level| level.http_tokens())
            .map(|t| TokenMode::parse(t.as_str()));

        debug!(region = %self.region, http_tokens = ?tokens, "Read account metadata defaults");
        Ok(tokens)
    }

    /// Enforce IMDSv2 on a single instance
    pub(super) async fn modify_instance_tokens(
        &self,
        instance_id: &str,
    ) -> Result<ApplyState, ApiError> {
        let response = self
            .client
            .modify_instance_metadata_options()
            .instance_id(instance_id)
            .http_tokens(HttpTokensState::Required)
            .send()
            .await
            .map_err(api_error_from_sdk)?;

        let state = apply_state(response.instance_metadata_options().and_then(|o| o.state()));

        info!(region = %self.region, instance_id = %instance_id, state = %state, "IMDSv2 enforced");
        Ok(state)
    }

    /// Set the region's account-level default to `required`
    pub(super) async fn modify_default_tokens(&self) -> Result<bool, ApiError> {
        let response = self
            .client
            .modify_instance_metadata_defaults()
            .http_tokens(MetadataDefaultHttpTokensState::Required)
            .send()
            .await
            .map_err(api_error_from_sdk)?;

        let acknowledged = response.r#return().unwrap_or(false);
        info!(region = %self.region, acknowledged, "Account metadata defaults modified");
        Ok(acknowledged)
    }
}

/// Map the modify response state; only an explicit `applied` counts as applied
fn apply_state(state: Option<&InstanceMetadataOptionsState>) -> ApplyState {
    match state {
        Some(InstanceMetadataOptionsState::Applied) => ApplyState::Applied,
        _ => ApplyState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_state_is_applied() {
        assert_eq!(
            apply_state(Some(&InstanceMetadataOptionsState::Applied)),
            ApplyState::Applied
        );
    }

    #[test]
    fn pending_state_is_pending() {
        assert_eq!(
            apply_state(Some(&InstanceMetadataOptionsState::Pending)),
            ApplyState::Pending
        );
    }

    #[test]
    fn missing_state_is_pending() {
        assert_eq!(apply_state(None), ApplyState::Pending);
    }
}
