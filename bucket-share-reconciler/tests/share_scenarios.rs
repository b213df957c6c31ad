//! End-to-end grant and revoke scenarios against the in-memory policy store.

use std::sync::Arc;

use async_trait::async_trait;
use bucket_share_reconciler::{
    AlarmPublisher, AwsResult, DocumentKey, InMemoryPolicyStore, PolicyDocument, ShareConfig,
    ShareContext, ShareError, ShareManager,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

const SOURCE: &str = "111111111111";
const TARGET: &str = "222222222222";
const IDENTITY_POLICY: &str = "bucketshare-targetDatasetS3Bucket-AccessControlPolicy";

#[derive(Default)]
struct CollectingPublisher {
    subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl AlarmPublisher for CollectingPublisher {
    async fn publish(&self, subject: &str, _message: &str) -> AwsResult<()> {
        self.subjects.lock().await.push(subject.to_string());
        Ok(())
    }
}

fn context(requester: &str, kms_alias: Option<&str>) -> ShareContext {
    let raw = json!({
        "share": {
            "shareUri": format!("share-{requester}"),
            "datasetUri": "ds-1",
            "principalIAMRoleName": requester
        },
        "dataset": {
            "datasetUri": "ds-1",
            "name": "sales",
            "IAMDatasetAdminRoleArn": format!("arn:aws:iam::{SOURCE}:role/A1")
        },
        "bucket": {
            "bucketUri": "bucket-1",
            "s3BucketName": "b1",
            "awsAccountId": SOURCE,
            "region": "eu-west-1",
            "kmsAlias": kms_alias,
        },
        "sourceEnvironment": {
            "environmentUri": "env-src",
            "awsAccountId": SOURCE,
            "region": "eu-west-1"
        },
        "targetEnvironment": {
            "environmentUri": "env-tgt",
            "awsAccountId": TARGET,
            "region": "eu-west-1"
        },
        "sourceEnvGroup": {
            "groupUri": "admins",
            "environmentUri": "env-src",
            "environmentIAMRoleArn": format!("arn:aws:iam::{SOURCE}:role/EnvAdmin")
        },
        "envGroup": {
            "groupUri": "consumers",
            "environmentUri": "env-tgt",
            "environmentIAMRoleArn": format!("arn:aws:iam::{TARGET}:role/{requester}")
        }
    });
    ShareContext::from_json(&raw.to_string()).unwrap()
}

fn store() -> InMemoryPolicyStore {
    InMemoryPolicyStore::new()
        .with_role(SOURCE, "A1", "AROAA1")
        .with_role(TARGET, "R1", "AROAR1")
        .with_role(TARGET, "R2", "AROAR2")
}

fn manager(store: &Arc<InMemoryPolicyStore>, alarms: &Arc<CollectingPublisher>) -> ShareManager {
    ShareManager::new(ShareConfig::default(), store.clone(), store.clone(), alarms.clone()).unwrap()
}

fn bucket_key() -> DocumentKey {
    DocumentKey::bucket_policy(SOURCE, "eu-west-1", "b1")
}

fn identity_key(role: &str) -> DocumentKey {
    DocumentKey::role_policy(TARGET, role, IDENTITY_POLICY)
}

async fn json_of(store: &InMemoryPolicyStore, key: &DocumentKey) -> Option<Value> {
    let document = store.document(key).await?;
    Some(serde_json::from_str(&document.to_json().unwrap()).unwrap())
}

fn role(name: &str) -> String {
    format!("arn:aws:iam::{TARGET}:role/{name}")
}

#[tokio::test]
async fn bucket_policy_follows_grants_and_revokes() {
    let store = Arc::new(store());
    let alarms = Arc::new(CollectingPublisher::default());
    let manager = manager(&store, &alarms);
    let (r1, r2) = (context("R1", None), context("R2", None));

    manager.try_process_approved_share(&r1).await.unwrap();
    let policy = json_of(&store, &bucket_key()).await.unwrap();
    let statements = policy["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0]["Sid"], "AllowAllToAdmin");
    // only the dataset admin resolves; the environment admin and delegation roles are unknown
    assert_eq!(statements[0]["Condition"]["StringLike"]["aws:userId"], json!(["AROAA1:*"]));
    assert_eq!(statements[1]["Sid"], "BucketShare-ReadOnly");
    assert_eq!(statements[1]["Principal"]["AWS"], json!([role("R1")]));
    let owner = statements[0].clone();

    manager.try_process_approved_share(&r2).await.unwrap();
    let policy = json_of(&store, &bucket_key()).await.unwrap();
    assert_eq!(policy["Statement"][1]["Principal"]["AWS"], json!([role("R1"), role("R2")]));
    assert_eq!(policy["Statement"][0], owner);

    manager.try_process_revoked_share(&r1).await.unwrap();
    let policy = json_of(&store, &bucket_key()).await.unwrap();
    assert_eq!(policy["Statement"][1]["Principal"]["AWS"], json!([role("R2")]));

    manager.try_process_revoked_share(&r2).await.unwrap();
    let policy = json_of(&store, &bucket_key()).await.unwrap();
    assert_eq!(policy["Statement"], json!([owner]));
    assert!(alarms.subjects.lock().await.is_empty());
}

#[tokio::test]
async fn identity_policy_without_key_has_single_statement() {
    let store = Arc::new(store());
    let manager = manager(&store, &Arc::new(CollectingPublisher::default()));

    // the alias is unknown to the store, so every key step is skipped
    manager.try_process_approved_share(&context("R1", Some("missing"))).await.unwrap();

    let policy = json_of(&store, &identity_key("R1")).await.unwrap();
    let statements = policy["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["Action"], json!(["s3:*"]));
    assert_eq!(statements[0]["Resource"], json!(["arn:aws:s3:::b1", "arn:aws:s3:::b1/*"]));

    manager.try_process_revoked_share(&context("R1", Some("missing"))).await.unwrap();
    assert!(store.document(&identity_key("R1")).await.is_none());
}

#[tokio::test]
async fn key_policy_grant_and_revoke() {
    let key = DocumentKey::key_policy(SOURCE, "eu-west-1", "key-1");
    let key_policy = PolicyDocument::from_json(
        r#"{"Version": "2012-10-17", "Statement": [{
            "Sid": "Root",
            "Effect": "Allow",
            "Principal": {"AWS": "arn:aws:iam::111111111111:root"},
            "Action": "kms:*",
            "Resource": "*"
        }]}"#,
    )
    .unwrap();
    let store = Arc::new(
        store()
            .with_key_alias(SOURCE, "eu-west-1", "alias/b1-key", "key-1")
            .with_document(key.clone(), key_policy.clone()),
    );
    let manager = manager(&store, &Arc::new(CollectingPublisher::default()));
    let ctx = context("R1", Some("b1-key"));

    manager.try_process_approved_share(&ctx).await.unwrap();
    let policy = json_of(&store, &key).await.unwrap();
    assert_eq!(
        policy["Statement"][1],
        json!({
            "Sid": "AROAR1",
            "Effect": "Allow",
            "Principal": {"AWS": "*"},
            "Action": "kms:Decrypt",
            "Resource": "*",
            "Condition": {"StringLike": {"aws:userId": "AROAR1:*"}}
        })
    );
    let identity = json_of(&store, &identity_key("R1")).await.unwrap();
    assert_eq!(
        identity["Statement"][1]["Resource"],
        json!(["arn:aws:kms:eu-west-1:111111111111:key/key-1"])
    );

    manager.try_process_revoked_share(&ctx).await.unwrap();
    assert_eq!(store.document(&key).await, Some(key_policy));
}

#[tokio::test]
async fn bare_string_principal_is_extended() {
    let existing = PolicyDocument::from_json(&format!(
        r#"{{"Version": "2012-10-17", "Statement": [
            {{"Sid": "Unrelated", "Effect": "Deny", "Principal": "*",
              "Action": "s3:DeleteBucket", "Resource": "arn:aws:s3:::b1"}},
            {{"Sid": "BucketShare-ReadOnly", "Effect": "Allow", "Principal": {{"AWS": "{}"}},
              "Action": ["s3:List*", "s3:GetObject"],
              "Resource": ["arn:aws:s3:::b1", "arn:aws:s3:::b1/*"]}},
            {{"Sid": "AllowAllToAdmin", "Effect": "Allow", "Principal": "*", "Action": "s3:*",
              "Resource": ["arn:aws:s3:::b1", "arn:aws:s3:::b1/*"],
              "Condition": {{"StringLike": {{"aws:userId": ["AROAA1:*"]}}}}}}
        ]}}"#,
        role("R1")
    ))
    .unwrap();
    let store = Arc::new(store().with_document(bucket_key(), existing.clone()));
    let manager = manager(&store, &Arc::new(CollectingPublisher::default()));

    manager.try_process_approved_share(&context("R2", None)).await.unwrap();
    let policy = json_of(&store, &bucket_key()).await.unwrap();
    assert_eq!(policy["Statement"][0]["Sid"], "Unrelated");
    assert_eq!(policy["Statement"][1]["Principal"]["AWS"], json!([role("R1"), role("R2")]));

    manager.try_process_revoked_share(&context("R2", None)).await.unwrap();
    let policy = json_of(&store, &bucket_key()).await.unwrap();
    assert_eq!(policy["Statement"][1]["Principal"]["AWS"], json!([role("R1")]));
    assert_eq!(policy["Statement"][0], serde_json::to_value(&existing.statement[0]).unwrap());
}

#[tokio::test]
async fn concurrent_grants_on_one_bucket_keep_both_requesters() {
    let store = Arc::new(store());
    let manager = Arc::new(manager(&store, &Arc::new(CollectingPublisher::default())));

    let tasks: Vec<_> = ["R1", "R2"]
        .into_iter()
        .map(|requester| {
            let manager = manager.clone();
            let ctx = context(requester, None);
            tokio::spawn(async move { manager.process_approved_share(&ctx).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let policy = json_of(&store, &bucket_key()).await.unwrap();
    let mut principals: Vec<String> =
        serde_json::from_value(policy["Statement"][1]["Principal"]["AWS"].clone()).unwrap();
    principals.sort();
    assert_eq!(principals, vec![role("R1"), role("R2")]);
}

#[tokio::test]
async fn external_writers_are_retried_until_exhausted() {
    let store = Arc::new(store());
    let alarms = Arc::new(CollectingPublisher::default());
    let manager = manager(&store, &alarms);

    store.inject_conflicts(identity_key("R1"), 2).await;
    manager.try_process_approved_share(&context("R1", None)).await.unwrap();
    assert!(store.document(&identity_key("R1")).await.is_some());

    store.inject_conflicts(bucket_key(), 100).await;
    let err = manager
        .try_process_revoked_share(&context("R1", None))
        .await
        .unwrap_err();
    match err {
        ShareError::RevokeFailed { source, .. } => {
            assert!(matches!(*source, ShareError::ConflictRetriesExhausted { attempts: 4, .. }));
        }
        other => panic!("expected RevokeFailed, got {other:?}"),
    }
    assert_eq!(
        alarms.subjects.lock().await.as_slice(),
        ["ALARM: S3 Bucket b1 Sharing Revoke Failure Notification".to_string()]
    );
}
