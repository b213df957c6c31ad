//! Reconciler configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ShareError, ShareResult};
use crate::synthesis::{BucketPolicySids, IdentityPolicySids};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareConfig {
    /// ARN partition (`aws`, `aws-cn`, `aws-us-gov`, ...).
    pub partition: String,

    /// Inline policy on the requester role holding its bucket grants.
    pub identity_policy_name: String,

    /// Sids of the bucket and key statements in the identity-role policy.
    pub identity_bucket_sid: String,
    pub identity_key_sid: String,

    /// Sids of the statements this crate owns in a bucket policy.
    pub read_only_sid: String,
    pub owner_sid: String,

    /// Service role present in every account, always granted owner access.
    pub delegation_role_name: String,

    /// SNS topic for failure alarms; alarms are only logged when unset.
    pub alarm_topic_arn: Option<String>,

    pub environment_name: String,
    pub region: String,

    /// How many times a read-modify-write cycle is retried after losing a
    /// race with a concurrent writer.
    pub max_conflict_retries: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            partition: "aws".to_string(),
            identity_policy_name: "bucketshare-targetDatasetS3Bucket-AccessControlPolicy"
                .to_string(),
            identity_bucket_sid: "BucketShareS3Access".to_string(),
            identity_key_sid: "BucketShareKmsAccess".to_string(),
            read_only_sid: "BucketShare-ReadOnly".to_string(),
            owner_sid: "AllowAllToAdmin".to_string(),
            delegation_role_name: "bucketSharePivotRole".to_string(),
            alarm_topic_arn: None,
            environment_name: "dev".to_string(),
            region: "eu-west-1".to_string(),
            max_conflict_retries: 3,
        }
    }
}

impl ShareConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ShareResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ShareError::config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ShareError::config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ShareResult<()> {
        let required = [
            ("partition", &self.partition),
            ("identityPolicyName", &self.identity_policy_name),
            ("identityBucketSid", &self.identity_bucket_sid),
            ("identityKeySid", &self.identity_key_sid),
            ("readOnlySid", &self.read_only_sid),
            ("ownerSid", &self.owner_sid),
            ("delegationRoleName", &self.delegation_role_name),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ShareError::config(format!("{field} must not be empty")));
        }
        if self.read_only_sid == self.owner_sid {
            return Err(ShareError::config("readOnlySid and ownerSid must differ"));
        }
        if self.identity_bucket_sid == self.identity_key_sid {
            return Err(ShareError::config("identityBucketSid and identityKeySid must differ"));
        }
        if self.max_conflict_retries == 0 {
            return Err(ShareError::config("maxConflictRetries must be at least 1"));
        }
        Ok(())
    }

    pub fn bucket_policy_sids(&self) -> BucketPolicySids {
        BucketPolicySids {
            read_only: self.read_only_sid.clone(),
            owner: self.owner_sid.clone(),
        }
    }

    pub fn identity_policy_sids(&self) -> IdentityPolicySids {
        IdentityPolicySids {
            bucket: self.identity_bucket_sid.clone(),
            key: self.identity_key_sid.clone(),
        }
    }
}
