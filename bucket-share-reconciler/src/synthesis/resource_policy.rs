//! Reconciliation of the shared bucket's own policy and of its key policy.

use super::policy_builder::{
    add_principal, build_key_decrypt_statement, build_read_only_statement, remove_principal,
};
use super::statement_index::StatementIndex;
use super::DocumentChange;
use crate::types::{PolicyDocument, Statement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPolicySids {
    pub read_only: String,
    pub owner: String,
}

/// Policy for a bucket that has none yet: only the owner statement.
pub fn default_bucket_policy(owner_statement: Statement) -> PolicyDocument {
    PolicyDocument::new(vec![owner_statement])
}

/// Add the requester to the read-only statement and make sure the owner
/// statement exists. An owner statement already in the document is kept as
/// is; `owner_statement` fills the slot whenever the document lacks one.
pub fn grant_bucket_policy(
    existing: Option<&PolicyDocument>,
    sids: &BucketPolicySids,
    bucket_arns: &[String],
    requester_arn: &str,
    owner_statement: &Statement,
) -> DocumentChange {
    let mut document = existing
        .cloned()
        .unwrap_or_else(|| default_bucket_policy(owner_statement.clone()));
    let mut index = StatementIndex::from_statements(std::mem::take(&mut document.statement));

    let read_only = match index.get(&sids.read_only) {
        Some(statement) => add_principal(statement.clone(), requester_arn),
        None => build_read_only_statement(&sids.read_only, bucket_arns, requester_arn),
    };
    index.upsert(&sids.read_only, read_only);

    if !index.contains(&sids.owner) {
        index.upsert(&sids.owner, owner_statement.clone());
    }

    document.statement = index.into_statements();
    DocumentChange::put_if_changed(existing, document)
}

/// Drop the requester from the read-only statement, and the statement itself
/// once nobody is left. The owner statement is never touched.
pub fn revoke_bucket_policy(
    existing: Option<&PolicyDocument>,
    sids: &BucketPolicySids,
    requester_arn: &str,
) -> DocumentChange {
    let Some(original) = existing else {
        return DocumentChange::Unchanged;
    };
    let mut document = original.clone();
    let mut index = StatementIndex::from_statements(std::mem::take(&mut document.statement));

    let Some(read_only) = index.get(&sids.read_only) else {
        return DocumentChange::Unchanged;
    };
    if !super::policy_builder::principal_list(read_only)
        .iter()
        .any(|principal| principal == requester_arn)
    {
        return DocumentChange::Unchanged;
    }
    match remove_principal(read_only.clone(), requester_arn) {
        Some(statement) => index.upsert(&sids.read_only, statement),
        None => {
            index.remove(&sids.read_only);
        }
    }

    if index.is_empty() {
        return DocumentChange::Delete;
    }
    document.statement = index.into_statements();
    DocumentChange::Put(document)
}

/// Append a decrypt grant keyed by the requester's role id unless present.
pub fn grant_key_policy(
    existing: Option<&PolicyDocument>,
    requester_role_id: &str,
) -> DocumentChange {
    let Some(original) = existing else {
        return DocumentChange::Unchanged;
    };
    let mut document = original.clone();
    let mut index = StatementIndex::from_statements(std::mem::take(&mut document.statement));
    if index.contains(requester_role_id) {
        return DocumentChange::Unchanged;
    }
    index.upsert(requester_role_id, build_key_decrypt_statement(requester_role_id));
    document.statement = index.into_statements();
    DocumentChange::Put(document)
}

/// Remove the decrypt grant keyed by the requester's role id.
pub fn revoke_key_policy(
    existing: Option<&PolicyDocument>,
    requester_role_id: &str,
) -> DocumentChange {
    let Some(original) = existing else {
        return DocumentChange::Unchanged;
    };
    let mut document = original.clone();
    let mut index = StatementIndex::from_statements(std::mem::take(&mut document.statement));
    if index.remove(requester_role_id).is_none() {
        return DocumentChange::Unchanged;
    }
    document.statement = index.into_statements();
    DocumentChange::Put(document)
}
