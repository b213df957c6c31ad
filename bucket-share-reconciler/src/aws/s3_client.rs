//! S3 bucket policy operations

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::Client as S3Client;
use log::debug;

use crate::aws::{parse_policy, policy_json, AwsError, AwsResult};
use crate::types::PolicyDocument;

const NO_SUCH_BUCKET_POLICY: &str = "NoSuchBucketPolicy";

pub(crate) struct AwsS3Client {
    client: S3Client,
}

impl AwsS3Client {
    pub(crate) fn new(client: S3Client) -> Self {
        Self { client }
    }

    pub(crate) async fn get_bucket_policy(
        &self,
        bucket: &str,
    ) -> AwsResult<Option<(String, PolicyDocument)>> {
        match self.client.get_bucket_policy().bucket(bucket).send().await {
            Ok(response) => match response.policy() {
                Some(raw) => Ok(Some((raw.to_string(), parse_policy(raw)?))),
                None => Ok(None),
            },
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.code() == Some(NO_SUCH_BUCKET_POLICY) {
                    debug!("Bucket {bucket} has no policy");
                    return Ok(None);
                }
                Err(AwsError::S3Error(format!(
                    "Failed to get bucket policy for {bucket}: {service_err}"
                )))
            }
        }
    }

    pub(crate) async fn put_bucket_policy(
        &self,
        bucket: &str,
        policy_document: &PolicyDocument,
    ) -> AwsResult<()> {
        let policy_json = policy_json(policy_document)?;
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy_json)
            .send()
            .await
            .map_err(|e| {
                AwsError::S3Error(format!("Failed to put bucket policy for {bucket}: {e}"))
            })?;
        Ok(())
    }

    pub(crate) async fn delete_bucket_policy(&self, bucket: &str) -> AwsResult<()> {
        self.client
            .delete_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                AwsError::S3Error(format!("Failed to delete bucket policy for {bucket}: {e}"))
            })?;
        Ok(())
    }
}
