//! AWS SDK integration: IAM, S3, KMS and SNS clients behind the store,
//! resolver and alarm contracts.

pub(crate) mod iam_client;
pub(crate) mod kms_client;
pub(crate) mod s3_client;
pub mod session;
pub mod sns_client;
pub(crate) mod sts;
pub mod store;

use thiserror::Error;

pub use session::{CallerAccountSessionProvider, SessionProvider};
pub use sns_client::SnsAlarmPublisher;
pub use store::AwsPolicyStore;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS configuration error: {0}")]
    ConfigError(String),
    #[error("IAM client error: {0}")]
    IamError(String),
    #[error("S3 client error: {0}")]
    S3Error(String),
    #[error("KMS client error: {0}")]
    KmsError(String),
    #[error("SNS client error: {0}")]
    SnsError(String),
    #[error("STS client error: {0}")]
    StsError(String),
    #[error("Policy document error: {0}")]
    PolicyError(String),
    #[error("AWS SDK error: {0}")]
    SdkError(String),
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Credentials belong to account {caller}, but account {requested} was requested")]
    AccountMismatch { requested: String, caller: String },
}

pub type AwsResult<T> = Result<T, AwsError>;

/// Serialize a policy document for an SDK call.
pub(crate) fn policy_json(document: &crate::types::PolicyDocument) -> AwsResult<String> {
    document
        .to_json()
        .map_err(|e| AwsError::PolicyError(format!("Failed to serialize policy: {e}")))
}

/// Parse a policy document returned by an SDK call.
pub(crate) fn parse_policy(raw: &str) -> AwsResult<crate::types::PolicyDocument> {
    crate::types::PolicyDocument::from_json(raw)
        .map_err(|e| AwsError::PolicyError(format!("Failed to parse policy document JSON: {e}")))
}
