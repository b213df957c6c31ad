//! Share context records handed to the orchestrator by the share state machine.

use serde::{Deserialize, Serialize};

use crate::error::{ShareError, ShareResult};

/// An approved or revoked grant of a dataset bucket to a requester role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareObject {
    pub share_uri: String,
    pub dataset_uri: String,
    #[serde(rename = "principalIAMRoleName")]
    pub principal_iam_role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub dataset_uri: String,
    pub name: String,
    #[serde(rename = "IAMDatasetAdminRoleArn")]
    pub iam_dataset_admin_role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetBucket {
    pub bucket_uri: String,
    pub s3_bucket_name: String,
    pub aws_account_id: String,
    pub region: String,
    #[serde(default)]
    pub kms_alias: Option<String>,
    /// The bucket existed before it was registered with this system.
    #[serde(default)]
    pub imported: bool,
    /// An imported bucket was registered together with its KMS key.
    #[serde(default)]
    pub imported_kms_key: bool,
}

impl DatasetBucket {
    /// Whether this system is responsible for the bucket key's policy: either
    /// it created the key alongside the bucket, or the key was explicitly
    /// handed over when the bucket was imported.
    pub fn manages_key_policy(&self) -> bool {
        !self.imported || self.imported_kms_key
    }

    pub fn key_alias(&self) -> Option<String> {
        self.kms_alias
            .as_deref()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(|alias| {
                if alias.starts_with("alias/") {
                    alias.to_string()
                } else {
                    format!("alias/{alias}")
                }
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub environment_uri: String,
    #[serde(default)]
    pub label: String,
    pub aws_account_id: String,
    pub region: String,
    #[serde(default)]
    pub resource_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentGroup {
    pub group_uri: String,
    pub environment_uri: String,
    #[serde(rename = "environmentIAMRoleArn")]
    pub environment_iam_role_arn: String,
    #[serde(default, rename = "environmentIAMRoleName")]
    pub environment_iam_role_name: String,
}

/// Everything one grant or revoke needs to know about a shared bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareContext {
    pub share: ShareObject,
    pub dataset: Dataset,
    pub bucket: DatasetBucket,
    pub source_environment: Environment,
    pub target_environment: Environment,
    pub source_env_group: EnvironmentGroup,
    pub env_group: EnvironmentGroup,
}

impl ShareContext {
    pub fn from_json(raw: &str) -> ShareResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> ShareResult<()> {
        let required = [
            ("share.shareUri", &self.share.share_uri),
            ("share.principalIAMRoleName", &self.share.principal_iam_role_name),
            ("bucket.s3BucketName", &self.bucket.s3_bucket_name),
            ("bucket.awsAccountId", &self.bucket.aws_account_id),
            ("bucket.region", &self.bucket.region),
            ("targetEnvironment.awsAccountId", &self.target_environment.aws_account_id),
            ("dataset.IAMDatasetAdminRoleArn", &self.dataset.iam_dataset_admin_role_arn),
            (
                "sourceEnvGroup.environmentIAMRoleArn",
                &self.source_env_group.environment_iam_role_arn,
            ),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ShareError::InvalidContext(format!("{field} must not be empty")));
        }

        if self.share.dataset_uri != self.dataset.dataset_uri {
            return Err(ShareError::InvalidContext(format!(
                "share {} references dataset {} but context carries dataset {}",
                self.share.share_uri, self.share.dataset_uri, self.dataset.dataset_uri
            )));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::share_context;
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(false, false, true)]
    #[case(false, true, true)]
    #[case(true, true, true)]
    #[case(true, false, false)]
    fn test_manages_key_policy(
        #[case] imported: bool,
        #[case] imported_kms_key: bool,
        #[case] expected: bool,
    ) {
        let mut bucket = share_context("R1").bucket;
        bucket.imported = imported;
        bucket.imported_kms_key = imported_kms_key;
        assert_eq!(bucket.manages_key_policy(), expected);
    }

    #[rstest]
    #[case(Some("b1-key"), Some("alias/b1-key"))]
    #[case(Some("alias/b1-key"), Some("alias/b1-key"))]
    #[case(Some("  "), None)]
    #[case(None, None)]
    fn test_key_alias(#[case] kms_alias: Option<&str>, #[case] expected: Option<&str>) {
        let mut bucket = share_context("R1").bucket;
        bucket.kms_alias = kms_alias.map(str::to_string);
        assert_eq!(bucket.key_alias().as_deref(), expected);
    }

    #[test]
    fn test_validate_rejects_empty_role_name() {
        let mut ctx = share_context("R1");
        ctx.share.principal_iam_role_name = String::new();
        let err = ctx.validate().unwrap_err();
        assert!(err.to_string().contains("principalIAMRoleName"));
    }

    #[test]
    fn test_validate_rejects_dataset_mismatch() {
        let mut ctx = share_context("R1");
        ctx.dataset.dataset_uri = "ds-other".to_string();
        assert!(matches!(ctx.validate(), Err(ShareError::InvalidContext(_))));
    }

    #[test]
    fn test_context_parses_literal_json() {
        let raw = r#"{
            "share": {"shareUri": "share-R1", "datasetUri": "ds-1", "principalIAMRoleName": "R1"},
            "dataset": {
                "datasetUri": "ds-1",
                "name": "sales",
                "IAMDatasetAdminRoleArn": "arn:aws:iam::111111111111:role/DatasetAdmin"
            },
            "bucket": {
                "bucketUri": "bucket-1",
                "s3BucketName": "b1",
                "awsAccountId": "111111111111",
                "region": "eu-west-1",
                "kmsAlias": "b1-key"
            },
            "sourceEnvironment": {
                "environmentUri": "env-src",
                "label": "source",
                "awsAccountId": "111111111111",
                "region": "eu-west-1",
                "resourcePrefix": "share"
            },
            "targetEnvironment": {
                "environmentUri": "env-tgt",
                "label": "target",
                "awsAccountId": "222222222222",
                "region": "us-east-1",
                "resourcePrefix": "share"
            },
            "sourceEnvGroup": {
                "groupUri": "admins",
                "environmentUri": "env-src",
                "environmentIAMRoleArn": "arn:aws:iam::111111111111:role/EnvAdmin",
                "environmentIAMRoleName": "EnvAdmin"
            },
            "envGroup": {
                "groupUri": "consumers",
                "environmentUri": "env-tgt",
                "environmentIAMRoleArn": "arn:aws:iam::222222222222:role/R1",
                "environmentIAMRoleName": "R1"
            }
        }"#;
        let ctx = ShareContext::from_json(raw).unwrap();
        assert_eq!(ctx, share_context("R1"));
        ctx.validate().unwrap();
    }

    #[test]
    fn test_context_rejects_camel_cased_role_arn() {
        let raw = serde_json::to_string(&share_context("R1"))
            .unwrap()
            .replace("environmentIAMRoleArn", "environmentIamRoleArn");
        assert!(matches!(
            ShareContext::from_json(&raw),
            Err(ShareError::Serialization(_))
        ));
    }
}
