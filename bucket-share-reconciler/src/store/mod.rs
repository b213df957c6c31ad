//! Collaborator contracts for reading and writing policy documents and for
//! resolving AWS identities.
//!
//! Every read hands back a [`PolicyVersion`] token and every write carries
//! the token the new document was computed from, so a store can refuse a
//! write that would clobber a concurrent change.

pub mod locks;
pub mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::aws::AwsResult;
use crate::types::PolicyDocument;

pub use locks::ResourceLocks;
pub use memory::InMemoryPolicyStore;

/// Identifies one externally owned policy document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    /// Inline policy on an IAM role.
    RolePolicy {
        account_id: String,
        role_name: String,
        policy_name: String,
    },
    /// Resource policy of an S3 bucket.
    BucketPolicy {
        account_id: String,
        region: String,
        bucket_name: String,
    },
    /// Default key policy of a KMS key.
    KeyPolicy {
        account_id: String,
        region: String,
        key_id: String,
    },
}

impl DocumentKey {
    pub fn role_policy(account_id: &str, role_name: &str, policy_name: &str) -> Self {
        Self::RolePolicy {
            account_id: account_id.to_string(),
            role_name: role_name.to_string(),
            policy_name: policy_name.to_string(),
        }
    }

    pub fn bucket_policy(account_id: &str, region: &str, bucket_name: &str) -> Self {
        Self::BucketPolicy {
            account_id: account_id.to_string(),
            region: region.to_string(),
            bucket_name: bucket_name.to_string(),
        }
    }

    pub fn key_policy(account_id: &str, region: &str, key_id: &str) -> Self {
        Self::KeyPolicy {
            account_id: account_id.to_string(),
            region: region.to_string(),
            key_id: key_id.to_string(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RolePolicy {
                account_id,
                role_name,
                policy_name,
            } => write!(f, "role policy {policy_name} on {account_id}/{role_name}"),
            Self::BucketPolicy {
                account_id,
                region,
                bucket_name,
            } => write!(f, "bucket policy of {bucket_name} ({account_id}/{region})"),
            Self::KeyPolicy {
                account_id,
                region,
                key_id,
            } => write!(f, "key policy of {key_id} ({account_id}/{region})"),
        }
    }
}

/// Opaque token identifying the revision of a document that was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyVersion(String);

impl PolicyVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub document: T,
    pub version: PolicyVersion,
}

/// Get/put/delete access to the three kinds of policy documents.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetch a document, `None` when it does not exist.
    async fn get(&self, key: &DocumentKey) -> AwsResult<Option<Versioned<PolicyDocument>>>;

    /// Write a document. `expected` is the version the document was computed
    /// from, `None` when it did not exist; a mismatch is `AwsError::Conflict`.
    async fn put(
        &self,
        key: &DocumentKey,
        document: &PolicyDocument,
        expected: Option<&PolicyVersion>,
    ) -> AwsResult<()>;

    /// Delete a document left without statements.
    async fn delete(&self, key: &DocumentKey, expected: &PolicyVersion) -> AwsResult<()>;
}

/// Lookups that may legitimately come back empty.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve `alias/...` to a key id. `None` for an unknown alias.
    async fn resolve_key_id(
        &self,
        account_id: &str,
        region: &str,
        alias: &str,
    ) -> AwsResult<Option<String>>;

    /// The IAM unique id (`AROA...`) of a role. `None` for an unknown role.
    async fn resolve_role_id(&self, account_id: &str, role_name: &str) -> AwsResult<Option<String>>;

    /// Unique ids of the given role ARNs, skipping roles that do not exist.
    async fn resolve_role_ids(
        &self,
        account_id: &str,
        role_arns: &[String],
    ) -> AwsResult<Vec<String>> {
        let mut ids = Vec::with_capacity(role_arns.len());
        for arn in role_arns {
            let Some(role_name) = crate::arn::role_name_from_arn(arn) else {
                log::warn!("Skipping {arn}: not an IAM role ARN");
                continue;
            };
            match self.resolve_role_id(account_id, &role_name).await? {
                Some(id) => ids.push(id),
                None => log::warn!("Role {arn} does not exist in account {account_id}"),
            }
        }
        Ok(ids)
    }
}
