//! Policy store and identity resolver backed by the AWS APIs.
//!
//! None of IAM, S3 or KMS offer a conditional write on policies, so a write
//! re-reads the document first and refuses to proceed when its text no
//! longer matches the version the caller computed from. This narrows the
//! race window; the per-document lock in the orchestrator closes it within
//! one process.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::iam_client::AwsIamClient;
use super::kms_client::AwsKmsClient;
use super::s3_client::AwsS3Client;
use super::session::SessionProvider;
use super::{AwsError, AwsResult};
use crate::store::{DocumentKey, IdentityResolver, PolicyStore, PolicyVersion, Versioned};
use crate::types::PolicyDocument;

/// IAM is a global service; its clients are pinned to this region.
const IAM_REGION: &str = "us-east-1";

pub struct AwsPolicyStore {
    sessions: Arc<dyn SessionProvider>,
}

impl AwsPolicyStore {
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        Self { sessions }
    }

    async fn iam(&self, account_id: &str) -> AwsResult<AwsIamClient> {
        let config = self.sessions.config_for(account_id, IAM_REGION).await?;
        Ok(AwsIamClient::new(aws_sdk_iam::Client::new(&config)))
    }

    async fn s3(&self, account_id: &str, region: &str) -> AwsResult<AwsS3Client> {
        let config = self.sessions.config_for(account_id, region).await?;
        Ok(AwsS3Client::new(aws_sdk_s3::Client::new(&config)))
    }

    async fn kms(&self, account_id: &str, region: &str) -> AwsResult<AwsKmsClient> {
        let config = self.sessions.config_for(account_id, region).await?;
        Ok(AwsKmsClient::new(aws_sdk_kms::Client::new(&config)))
    }

    async fn ensure_unchanged(
        &self,
        key: &DocumentKey,
        expected: Option<&PolicyVersion>,
    ) -> AwsResult<()> {
        let current = self.get(key).await?.map(|versioned| versioned.version);
        if current.as_ref() != expected {
            return Err(AwsError::Conflict(format!("{key} changed since it was read")));
        }
        Ok(())
    }
}

fn versioned(read: Option<(String, PolicyDocument)>) -> Option<Versioned<PolicyDocument>> {
    read.map(|(raw, document)| Versioned {
        document,
        version: PolicyVersion::new(raw),
    })
}

#[async_trait]
impl PolicyStore for AwsPolicyStore {
    async fn get(&self, key: &DocumentKey) -> AwsResult<Option<Versioned<PolicyDocument>>> {
        debug!("Reading {key}");
        let read = match key {
            DocumentKey::RolePolicy {
                account_id,
                role_name,
                policy_name,
            } => {
                self.iam(account_id)
                    .await?
                    .get_role_policy(role_name, policy_name)
                    .await?
            }
            DocumentKey::BucketPolicy {
                account_id,
                region,
                bucket_name,
            } => self.s3(account_id, region).await?.get_bucket_policy(bucket_name).await?,
            DocumentKey::KeyPolicy {
                account_id,
                region,
                key_id,
            } => self.kms(account_id, region).await?.get_key_policy(key_id).await?,
        };
        Ok(versioned(read))
    }

    async fn put(
        &self,
        key: &DocumentKey,
        document: &PolicyDocument,
        expected: Option<&PolicyVersion>,
    ) -> AwsResult<()> {
        self.ensure_unchanged(key, expected).await?;
        debug!("Writing {key}");
        match key {
            DocumentKey::RolePolicy {
                account_id,
                role_name,
                policy_name,
            } => {
                self.iam(account_id)
                    .await?
                    .put_role_policy(role_name, policy_name, document)
                    .await
            }
            DocumentKey::BucketPolicy {
                account_id,
                region,
                bucket_name,
            } => {
                self.s3(account_id, region)
                    .await?
                    .put_bucket_policy(bucket_name, document)
                    .await
            }
            DocumentKey::KeyPolicy {
                account_id,
                region,
                key_id,
            } => self.kms(account_id, region).await?.put_key_policy(key_id, document).await,
        }
    }

    async fn delete(&self, key: &DocumentKey, expected: &PolicyVersion) -> AwsResult<()> {
        self.ensure_unchanged(key, Some(expected)).await?;
        debug!("Deleting {key}");
        match key {
            DocumentKey::RolePolicy {
                account_id,
                role_name,
                policy_name,
            } => {
                self.iam(account_id)
                    .await?
                    .delete_role_policy(role_name, policy_name)
                    .await
            }
            DocumentKey::BucketPolicy {
                account_id,
                region,
                bucket_name,
            } => self.s3(account_id, region).await?.delete_bucket_policy(bucket_name).await,
            DocumentKey::KeyPolicy { .. } => {
                Err(AwsError::KmsError(format!("{key} cannot be deleted")))
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for AwsPolicyStore {
    async fn resolve_key_id(
        &self,
        account_id: &str,
        region: &str,
        alias: &str,
    ) -> AwsResult<Option<String>> {
        self.kms(account_id, region).await?.get_key_id(alias).await
    }

    async fn resolve_role_id(
        &self,
        account_id: &str,
        role_name: &str,
    ) -> AwsResult<Option<String>> {
        self.iam(account_id).await?.get_role_id(role_name).await
    }
}
