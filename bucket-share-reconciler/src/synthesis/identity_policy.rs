//! Reconciliation of the requester's inline identity-role policy.
//!
//! The policy holds at most two statements owned by this crate, addressed by
//! Sid: one granting `s3:*` on every shared bucket and one granting `kms:*`
//! on every paired bucket key. Coarse action sets are scoped tightly to the
//! exact resource ARNs.

use super::policy_builder::build_identity_statement;
use super::statement_index::StatementIndex;
use super::DocumentChange;
use crate::types::{OneOrMany, PolicyDocument};

pub const BUCKET_ACTION: &str = "s3:*";
pub const KEY_ACTION: &str = "kms:*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPolicySids {
    pub bucket: String,
    pub key: String,
}

/// ARNs of one share: the bucket ARN pair and, when the bucket key could be
/// resolved, its key ARN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityResources {
    pub bucket_arns: Vec<String>,
    pub key_arns: Vec<String>,
}

/// Union the share's ARNs into the policy, creating it when absent.
pub fn grant_identity_policy(
    existing: Option<&PolicyDocument>,
    sids: &IdentityPolicySids,
    resources: &IdentityResources,
) -> DocumentChange {
    let mut document = existing
        .cloned()
        .unwrap_or_else(|| PolicyDocument::new(Vec::new()));
    let mut index = StatementIndex::from_statements(std::mem::take(&mut document.statement));
    adopt_unnamed_statements(&mut index, sids);

    add_resources(&mut index, &sids.bucket, BUCKET_ACTION, &resources.bucket_arns);
    add_resources(&mut index, &sids.key, KEY_ACTION, &resources.key_arns);

    document.statement = index.into_statements();
    DocumentChange::put_if_changed(existing, document)
}

/// Remove the share's ARNs. Statements left without resources are dropped
/// and a policy left without statements is deleted.
pub fn revoke_identity_policy(
    existing: Option<&PolicyDocument>,
    sids: &IdentityPolicySids,
    resources: &IdentityResources,
) -> DocumentChange {
    let Some(original) = existing else {
        return DocumentChange::Unchanged;
    };
    let mut document = original.clone();
    let mut index = StatementIndex::from_statements(std::mem::take(&mut document.statement));
    adopt_unnamed_statements(&mut index, sids);

    remove_resources(&mut index, &sids.bucket, &resources.bucket_arns);
    remove_resources(&mut index, &sids.key, &resources.key_arns);

    if index.is_empty() {
        return DocumentChange::Delete;
    }
    document.statement = index.into_statements();
    DocumentChange::put_if_changed(existing, document)
}

/// Policies written before statements carried Sids hold the bucket statement
/// first and the key statement second. Claim them by their action so the
/// rest of the reconciliation can address them by Sid.
fn adopt_unnamed_statements(index: &mut StatementIndex, sids: &IdentityPolicySids) {
    let unnamed: Vec<(usize, Vec<String>)> = index
        .unnamed()
        .map(|(placeholder, statement)| (placeholder, statement.actions()))
        .collect();
    let mut candidates = unnamed.into_iter();

    if !index.contains(&sids.bucket) {
        if let Some((placeholder, _)) = candidates
            .by_ref()
            .find(|(_, actions)| grants_only(actions, BUCKET_ACTION))
        {
            index.assign_sid(placeholder, &sids.bucket);
        }
    }
    if !index.contains(&sids.key) {
        if let Some((placeholder, _)) =
            candidates.find(|(_, actions)| grants_only(actions, KEY_ACTION))
        {
            index.assign_sid(placeholder, &sids.key);
        }
    }
}

fn grants_only(actions: &[String], action: &str) -> bool {
    actions.len() == 1 && actions[0] == action
}

fn add_resources(index: &mut StatementIndex, sid: &str, action: &str, arns: &[String]) {
    if arns.is_empty() {
        return;
    }
    let statement = match index.get(sid) {
        Some(existing) => {
            let mut resources = existing.resources();
            for arn in arns {
                if !resources.contains(arn) {
                    resources.push(arn.clone());
                }
            }
            if existing.resource.as_ref().map(OneOrMany::to_vec) == Some(resources.clone()) {
                return;
            }
            existing.clone().with_resource(OneOrMany::Many(resources))
        }
        None => build_identity_statement(sid, action, arns),
    };
    index.upsert(sid, statement);
}

fn remove_resources(index: &mut StatementIndex, sid: &str, arns: &[String]) {
    let Some(existing) = index.get(sid) else {
        return;
    };
    let current = existing.resources();
    if !arns.iter().any(|arn| current.contains(arn)) {
        return;
    }
    let remaining: Vec<String> = current.into_iter().filter(|arn| !arns.contains(arn)).collect();
    if remaining.is_empty() {
        index.remove(sid);
    } else {
        let statement = existing.clone().with_resource(OneOrMany::Many(remaining));
        index.upsert(sid, statement);
    }
}
