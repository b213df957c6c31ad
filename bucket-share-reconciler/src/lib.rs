//! This crate provides the core business logic for cross-account bucket sharing:
//! - Policy synthesis for the requester's identity-role policy, the bucket
//!   policy and the bucket key policy
//! - Grant/revoke orchestration with per-document locking and conflict retries
//! - Failure alarms and the environment resource lifecycle registry
//! - AWS-backed policy store, identity resolver and alarm publisher
//!

pub mod alarm;
pub mod arn;
pub mod aws;
pub mod commands;
pub mod config;
mod error;
pub mod lifecycle;
pub mod models;
pub mod store;
pub mod synthesis;
pub mod types;

// Re-exports for a small, focused public API
pub use alarm::{AlarmKind, AlarmPublisher, LogAlarmPublisher, ShareAlarmService};
pub use aws::{AwsError, AwsResult};
pub use commands::ShareManager;
pub use config::ShareConfig;
pub use error::{ShareError, ShareResult};
pub use lifecycle::{EnvironmentResource, EnvironmentResourceManager};
pub use models::{Dataset, DatasetBucket, Environment, EnvironmentGroup, ShareContext, ShareObject};
pub use store::{
    DocumentKey, IdentityResolver, InMemoryPolicyStore, PolicyStore, PolicyVersion, ResourceLocks,
    Versioned,
};
pub use synthesis::DocumentChange;
pub use types::{Effect, OneOrMany, PolicyDocument, Principal, Statement};
