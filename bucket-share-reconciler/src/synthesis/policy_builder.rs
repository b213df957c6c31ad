//! Builders for the statements this crate owns on shared resources.

use serde_json::{json, Map, Value};

use crate::types::{OneOrMany, Principal, Statement};

pub const READ_ONLY_ACTIONS: [&str; 2] = ["s3:List*", "s3:GetObject"];
pub const USER_ID_CONDITION_KEY: &str = "aws:userId";

/// Read-only grant on a bucket naming exactly one principal.
pub fn build_read_only_statement(
    sid: &str,
    resource_arns: &[String],
    principal_arn: &str,
) -> Statement {
    Statement::allow()
        .with_sid(sid)
        .with_principal(Principal::aws([principal_arn.to_string()]))
        .with_action(OneOrMany::Many(
            READ_ONLY_ACTIONS.iter().map(ToString::to_string).collect(),
        ))
        .with_resource(OneOrMany::Many(resource_arns.to_vec()))
}

/// Owner grant for every session of the excepted roles, matched on
/// `aws:userId` so it keeps working when a role ARN is recreated.
pub fn build_owner_statement(
    sid: &str,
    resource_arns: &[String],
    excepted_role_ids: &[String],
) -> Statement {
    let user_ids: Vec<String> = excepted_role_ids
        .iter()
        .map(|role_id| format!("{role_id}:*"))
        .collect();
    Statement::allow()
        .with_sid(sid)
        .with_principal(Principal::any())
        .with_action(OneOrMany::One("s3:*".to_string()))
        .with_resource(OneOrMany::Many(resource_arns.to_vec()))
        .with_condition(string_like_user_id(json!(user_ids)))
}

/// Key policy grant letting any session of the requester role decrypt.
pub fn build_key_decrypt_statement(requester_role_id: &str) -> Statement {
    let mut principal = indexmap::IndexMap::new();
    principal.insert(
        Principal::AWS.to_string(),
        OneOrMany::One("*".to_string()),
    );
    Statement::allow()
        .with_sid(requester_role_id)
        .with_principal(Principal::Mapped(principal))
        .with_action(OneOrMany::One("kms:Decrypt".to_string()))
        .with_resource(OneOrMany::One("*".to_string()))
        .with_condition(string_like_user_id(json!(format!("{requester_role_id}:*"))))
}

/// Identity-role statement granting a whole service action namespace on
/// exactly the listed resources.
pub fn build_identity_statement(sid: &str, action: &str, resource_arns: &[String]) -> Statement {
    Statement::allow()
        .with_sid(sid)
        .with_action(OneOrMany::Many(vec![action.to_string()]))
        .with_resource(OneOrMany::Many(resource_arns.to_vec()))
}

fn string_like_user_id(values: Value) -> Map<String, Value> {
    let mut string_like = Map::new();
    string_like.insert(USER_ID_CONDITION_KEY.to_string(), values);
    let mut condition = Map::new();
    condition.insert("StringLike".to_string(), Value::Object(string_like));
    condition
}

/// `Principal.AWS` of a statement as a list, whichever shape it was stored in.
pub fn principal_list(statement: &Statement) -> Vec<String> {
    statement
        .principal
        .as_ref()
        .map(Principal::aws_principals)
        .unwrap_or_default()
}

/// Add `principal_arn` to the statement's AWS principals unless present.
/// Other principal kinds (`Service`, ...) are kept.
pub fn add_principal(mut statement: Statement, principal_arn: &str) -> Statement {
    let mut principals = principal_list(&statement);
    if !principals.iter().any(|p| p == principal_arn) {
        principals.push(principal_arn.to_string());
    }
    set_aws_principals(&mut statement, principals);
    statement
}

/// Remove `principal_arn` from the statement. `None` means no principal is
/// left and the caller must drop the whole statement.
pub fn remove_principal(mut statement: Statement, principal_arn: &str) -> Option<Statement> {
    let mut principals = principal_list(&statement);
    principals.retain(|p| p != principal_arn);
    if principals.is_empty() {
        return None;
    }
    set_aws_principals(&mut statement, principals);
    Some(statement)
}

fn set_aws_principals(statement: &mut Statement, principals: Vec<String>) {
    match statement.principal.as_mut() {
        Some(Principal::Mapped(map)) => {
            map.insert(Principal::AWS.to_string(), OneOrMany::Many(principals));
        }
        _ => statement.principal = Some(Principal::aws(principals)),
    }
}
