//! Error types for share reconciliation.

use thiserror::Error;

use crate::aws::AwsError;

pub type ShareResult<T> = Result<T, ShareError>;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid share context: {0}")]
    InvalidContext(String),

    #[error("None of the owner roles {roles:?} could be resolved in account {account_id}")]
    UnresolvedOwnerRoles {
        account_id: String,
        roles: Vec<String>,
    },

    #[error("Gave up writing {document} after {attempts} conflicting attempts")]
    ConflictRetriesExhausted { document: String, attempts: u32 },

    #[error("Environment resource handler failed: {0}")]
    Lifecycle(String),

    #[error("Failed to share bucket {bucket} for share {share_uri}: {source}")]
    ShareFailed {
        share_uri: String,
        bucket: String,
        #[source]
        source: Box<ShareError>,
    },

    #[error("Failed to revoke bucket {bucket} for share {share_uri}: {source}")]
    RevokeFailed {
        share_uri: String,
        bucket: String,
        #[source]
        source: Box<ShareError>,
    },
}

impl ShareError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }
}
