//! KMS key policy and alias operations

use aws_sdk_kms::Client as KmsClient;

use crate::aws::{parse_policy, policy_json, AwsError, AwsResult};
use crate::types::PolicyDocument;

/// KMS keys carry exactly one policy, named `default`.
const DEFAULT_POLICY_NAME: &str = "default";

pub(crate) struct AwsKmsClient {
    client: KmsClient,
}

impl AwsKmsClient {
    pub(crate) fn new(client: KmsClient) -> Self {
        Self { client }
    }

    /// Resolve `alias/...` to the key id, `None` when no such alias exists.
    pub(crate) async fn get_key_id(&self, alias: &str) -> AwsResult<Option<String>> {
        match self.client.describe_key().key_id(alias).send().await {
            Ok(response) => Ok(response
                .key_metadata()
                .map(|metadata| metadata.key_id().to_string())),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found_exception() {
                    return Ok(None);
                }
                Err(AwsError::KmsError(format!(
                    "Failed to describe key {alias}: {service_err}"
                )))
            }
        }
    }

    pub(crate) async fn get_key_policy(
        &self,
        key_id: &str,
    ) -> AwsResult<Option<(String, PolicyDocument)>> {
        let response = self
            .client
            .get_key_policy()
            .key_id(key_id)
            .policy_name(DEFAULT_POLICY_NAME)
            .send()
            .await
            .map_err(|e| {
                AwsError::KmsError(format!("Failed to get key policy for {key_id}: {e}"))
            })?;
        match response.policy() {
            Some(raw) => Ok(Some((raw.to_string(), parse_policy(raw)?))),
            None => Ok(None),
        }
    }

    pub(crate) async fn put_key_policy(
        &self,
        key_id: &str,
        policy_document: &PolicyDocument,
    ) -> AwsResult<()> {
        let policy_json = policy_json(policy_document)?;
        self.client
            .put_key_policy()
            .key_id(key_id)
            .policy_name(DEFAULT_POLICY_NAME)
            .policy(policy_json)
            .send()
            .await
            .map_err(|e| {
                AwsError::KmsError(format!("Failed to put key policy for {key_id}: {e}"))
            })?;
        Ok(())
    }
}
