//! Policy synthesis: pure, deterministic mutations of policy documents.
//!
//! Nothing here performs I/O. Each reconciliation takes the document as it
//! was read (or `None` when it does not exist) and returns the change to
//! persist.

pub mod identity_policy;
pub mod policy_builder;
pub mod resource_policy;
pub mod statement_index;

pub use identity_policy::{
    grant_identity_policy, revoke_identity_policy, IdentityPolicySids, IdentityResources,
};
pub use resource_policy::{
    default_bucket_policy, grant_bucket_policy, grant_key_policy, revoke_bucket_policy,
    revoke_key_policy, BucketPolicySids,
};
pub use statement_index::{StatementIndex, StatementKey};

use crate::types::PolicyDocument;

/// Outcome of reconciling one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    /// Write this document back.
    Put(PolicyDocument),
    /// The document has no statements left and must be removed.
    Delete,
    /// The document already reflects the requested state.
    Unchanged,
}

impl DocumentChange {
    /// `Put(updated)` unless `updated` equals the document it came from.
    pub(crate) fn put_if_changed(
        original: Option<&PolicyDocument>,
        updated: PolicyDocument,
    ) -> Self {
        if original == Some(&updated) {
            Self::Unchanged
        } else {
            Self::Put(updated)
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Put(_) => "updated",
            Self::Delete => "deleted",
            Self::Unchanged => "unchanged",
        }
    }
}
