//! AWS IAM client wrapper for inline role policies and role ids

use crate::aws::{parse_policy, policy_json, AwsError, AwsResult};
use crate::types::PolicyDocument;
use aws_sdk_iam::Client as IamClient;

pub(crate) struct AwsIamClient {
    client: IamClient,
}

impl AwsIamClient {
    pub(crate) fn new(client: IamClient) -> Self {
        Self { client }
    }

    /// Fetch an inline role policy as the raw (URL decoded) JSON text.
    pub(crate) async fn get_role_policy_raw(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> AwsResult<Option<String>> {
        let response = match self
            .client
            .get_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_entity_exception() {
                    return Ok(None);
                }
                return Err(AwsError::IamError(format!(
                    "Failed to get role policy '{policy_name}' on role '{role_name}': {service_err}"
                )));
            }
        };

        // AWS returns the policy document URL-encoded
        let decoded = percent_encoding::percent_decode_str(&response.policy_document)
            .decode_utf8()
            .map_err(|e| {
                AwsError::PolicyError(format!("Failed to URL decode policy document: {e}"))
            })?;
        Ok(Some(decoded.into_owned()))
    }

    pub(crate) async fn get_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> AwsResult<Option<(String, PolicyDocument)>> {
        match self.get_role_policy_raw(role_name, policy_name).await? {
            Some(raw) => {
                let document = parse_policy(&raw)?;
                Ok(Some((raw, document)))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy_document: &PolicyDocument,
    ) -> AwsResult<()> {
        let policy_json = policy_json(policy_document)?;

        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(policy_json)
            .send()
            .await
            .map_err(|e| {
                AwsError::IamError(format!(
                    "Failed to put role policy '{policy_name}' on role '{role_name}': {e:?}"
                ))
            })?;
        Ok(())
    }

    pub(crate) async fn delete_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> AwsResult<()> {
        match self
            .client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_entity_exception() {
                    return Ok(());
                }
                Err(AwsError::IamError(format!(
                    "Failed to delete role policy '{policy_name}' of '{role_name}': {service_err}"
                )))
            }
        }
    }

    /// Unique id (`AROA...`) of a role, `None` when the role does not exist.
    pub(crate) async fn get_role_id(&self, role_name: &str) -> AwsResult<Option<String>> {
        match self.client.get_role().role_name(role_name).send().await {
            Ok(response) => Ok(response.role().map(|role| role.role_id().to_string())),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_no_such_entity_exception() {
                    return Ok(None);
                }
                Err(AwsError::IamError(format!(
                    "Failed to get role '{role_name}': {service_err}"
                )))
            }
        }
    }
}
