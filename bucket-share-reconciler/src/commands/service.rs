//! Bucket Share Service Layer
//!
//! [`ShareManager`] holds the collaborators a share operation needs and
//! drives the read-modify-write cycle of each policy document. The grant
//! and revoke sequences themselves live in `approve.rs` and `revoke.rs`.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::alarm::{AlarmKind, AlarmPublisher, LogAlarmPublisher, ShareAlarmService};
use crate::arn::{bucket_arns, key_arn, role_arn};
use crate::aws::{AwsError, AwsPolicyStore, CallerAccountSessionProvider, SnsAlarmPublisher};
use crate::config::ShareConfig;
use crate::error::{ShareError, ShareResult};
use crate::models::ShareContext;
use crate::store::{DocumentKey, IdentityResolver, PolicyStore, ResourceLocks};
use crate::synthesis::{DocumentChange, IdentityResources};
use crate::types::PolicyDocument;

pub struct ShareManager {
    pub(crate) config: ShareConfig,
    pub(crate) store: Arc<dyn PolicyStore>,
    pub(crate) resolver: Arc<dyn IdentityResolver>,
    pub(crate) alarms: ShareAlarmService,
    pub(crate) locks: Arc<ResourceLocks>,
}

/// Everything a share touches, derived from its context.
pub(crate) struct ShareTargets {
    pub(crate) requester_arn: String,
    pub(crate) bucket_arns: Vec<String>,
    pub(crate) key_id: Option<String>,
    pub(crate) identity_policy: DocumentKey,
    pub(crate) bucket_policy: DocumentKey,
}

impl ShareTargets {
    pub(crate) fn identity_resources(
        &self,
        partition: &str,
        ctx: &ShareContext,
    ) -> IdentityResources {
        IdentityResources {
            bucket_arns: self.bucket_arns.clone(),
            key_arns: self
                .key_id
                .iter()
                .map(|key_id| {
                    key_arn(partition, &ctx.bucket.region, &ctx.bucket.aws_account_id, key_id)
                })
                .collect(),
        }
    }

    /// The key policy this system may edit, if the bucket has a resolvable
    /// key whose policy it manages.
    pub(crate) fn key_policy(&self, ctx: &ShareContext) -> Option<DocumentKey> {
        if !ctx.bucket.manages_key_policy() {
            debug!(
                "Key policy of imported bucket {} is managed externally",
                ctx.bucket.s3_bucket_name
            );
            return None;
        }
        self.key_id.as_deref().map(|key_id| {
            DocumentKey::key_policy(&ctx.bucket.aws_account_id, &ctx.bucket.region, key_id)
        })
    }
}

impl ShareManager {
    /// Create a manager over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns `ShareError::Config` when the configuration is invalid.
    pub fn new(
        config: ShareConfig,
        store: Arc<dyn PolicyStore>,
        resolver: Arc<dyn IdentityResolver>,
        publisher: Arc<dyn AlarmPublisher>,
    ) -> ShareResult<Self> {
        config.validate()?;
        let alarms = ShareAlarmService::new(publisher, &config.environment_name, &config.region);
        Ok(Self {
            config,
            store,
            resolver,
            alarms,
            locks: Arc::new(ResourceLocks::new()),
        })
    }

    /// Share the lock registry with other managers in the same process.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<ResourceLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Create a manager backed by the AWS APIs, using the standard credential
    /// provider chain. Alarms go to the configured SNS topic, or to the log
    /// when none is configured.
    pub async fn from_aws(config: ShareConfig) -> ShareResult<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let publisher: Arc<dyn AlarmPublisher> = match &config.alarm_topic_arn {
            Some(topic_arn) => Arc::new(SnsAlarmPublisher::new(&sdk_config, topic_arn)),
            None => Arc::new(LogAlarmPublisher),
        };
        let sessions = Arc::new(CallerAccountSessionProvider::new(sdk_config));
        let store = Arc::new(AwsPolicyStore::new(sessions));
        Self::new(config, store.clone(), store, publisher)
    }

    pub fn config(&self) -> &ShareConfig {
        &self.config
    }

    pub(crate) async fn targets(&self, ctx: &ShareContext) -> ShareResult<ShareTargets> {
        let partition = &self.config.partition;
        let bucket = &ctx.bucket;
        let target = &ctx.target_environment;
        let role_name = &ctx.share.principal_iam_role_name;

        let key_id = match bucket.key_alias() {
            Some(alias) => {
                let key_id = self
                    .resolver
                    .resolve_key_id(&bucket.aws_account_id, &bucket.region, &alias)
                    .await?;
                if key_id.is_none() {
                    warn!(
                        "Key {alias} of bucket {} not found, skipping key steps",
                        bucket.s3_bucket_name
                    );
                }
                key_id
            }
            None => None,
        };

        Ok(ShareTargets {
            requester_arn: role_arn(partition, &target.aws_account_id, role_name),
            bucket_arns: bucket_arns(partition, &bucket.s3_bucket_name),
            key_id,
            identity_policy: DocumentKey::role_policy(
                &target.aws_account_id,
                role_name,
                &self.config.identity_policy_name,
            ),
            bucket_policy: DocumentKey::bucket_policy(
                &bucket.aws_account_id,
                &bucket.region,
                &bucket.s3_bucket_name,
            ),
        })
    }

    /// IAM unique id of the requester role; `None` when the role is gone.
    pub(crate) async fn requester_role_id(
        &self,
        ctx: &ShareContext,
    ) -> ShareResult<Option<String>> {
        let role_name = &ctx.share.principal_iam_role_name;
        let account_id = &ctx.target_environment.aws_account_id;
        let role_id = self.resolver.resolve_role_id(account_id, role_name).await?;
        if role_id.is_none() {
            warn!(
                "Requester role {role_name} not found in account {account_id}, skipping key policy"
            );
        }
        Ok(role_id)
    }

    /// Read `key`, compute its new content with `reconcile` and write it back.
    ///
    /// The cycle runs under the document's lock. When the store reports that
    /// the document changed underneath, the cycle starts over from a fresh
    /// read, at most `max_conflict_retries` more times.
    pub(crate) async fn reconcile_document<F>(
        &self,
        key: &DocumentKey,
        mut reconcile: F,
    ) -> ShareResult<DocumentChange>
    where
        F: FnMut(Option<&PolicyDocument>) -> DocumentChange + Send,
    {
        let _guard = self.locks.acquire(key).await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (document, version) = match self.store.get(key).await? {
                Some(versioned) => (Some(versioned.document), Some(versioned.version)),
                None => (None, None),
            };
            let change = reconcile(document.as_ref());
            let written = match (&change, &version) {
                (DocumentChange::Unchanged, _) | (DocumentChange::Delete, None) => Ok(()),
                (DocumentChange::Put(updated), _) => {
                    self.store.put(key, updated, version.as_ref()).await
                }
                (DocumentChange::Delete, Some(version)) => self.store.delete(key, version).await,
            };
            match written {
                Ok(()) => {
                    info!("{key} {}", change.describe());
                    return Ok(change);
                }
                Err(AwsError::Conflict(reason)) if attempt <= self.config.max_conflict_retries => {
                    warn!("Attempt {attempt} on {key} lost a race ({reason}), retrying");
                }
                Err(AwsError::Conflict(_)) => {
                    return Err(ShareError::ConflictRetriesExhausted {
                        document: key.to_string(),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Log the failure with its share context, raise the alarm and wrap the
    /// error for the caller.
    pub(crate) async fn report_failure(
        &self,
        kind: AlarmKind,
        ctx: &ShareContext,
        source: ShareError,
    ) -> ShareError {
        let bucket = &ctx.bucket;
        let target = &ctx.target_environment;
        error!(
            "Failed to {} bucket {} from {}/{} to {}/{} for share {}: {source}",
            kind.label(),
            bucket.s3_bucket_name,
            bucket.aws_account_id,
            bucket.region,
            target.aws_account_id,
            target.region,
            ctx.share.share_uri
        );
        self.alarms.trigger_bucket_sharing_failure_alarm(kind, ctx).await;

        let share_uri = ctx.share.share_uri.clone();
        let bucket = bucket.s3_bucket_name.clone();
        let source = Box::new(source);
        match kind {
            AlarmKind::Share => ShareError::ShareFailed {
                share_uri,
                bucket,
                source,
            },
            AlarmKind::Revoke => ShareError::RevokeFailed {
                share_uri,
                bucket,
                source,
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::harness::*;
    use super::*;
    use crate::alarm::recording::RecordingAlarmPublisher;
    use crate::models::fixtures::share_context;
    use crate::store::InMemoryPolicyStore;
    use crate::types::{OneOrMany, Statement};

    fn marker(sid: &str) -> PolicyDocument {
        PolicyDocument::new(vec![Statement::allow()
            .with_sid(sid)
            .with_action(OneOrMany::One("s3:GetObject".to_string()))])
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let store = Arc::new(InMemoryPolicyStore::new());
        let config = ShareConfig {
            max_conflict_retries: 0,
            ..ShareConfig::default()
        };
        let result = ShareManager::new(config, store.clone(), store, Arc::new(LogAlarmPublisher));
        assert!(matches!(result, Err(ShareError::Config(_))));
    }

    #[tokio::test]
    async fn test_targets_resolve_key_and_arns() {
        let store = Arc::new(store());
        let manager = manager(store, Arc::new(RecordingAlarmPublisher::default()));
        let ctx = share_context("R1");

        let targets = manager.targets(&ctx).await.unwrap();
        assert_eq!(targets.requester_arn, "arn:aws:iam::222222222222:role/R1");
        assert_eq!(targets.bucket_arns, vec!["arn:aws:s3:::b1", "arn:aws:s3:::b1/*"]);
        assert_eq!(targets.key_id.as_deref(), Some(KEY_ID));
        assert_eq!(targets.identity_policy, identity_key("R1"));
        assert_eq!(targets.key_policy(&ctx), Some(key_policy_key()));
        assert_eq!(
            targets.identity_resources("aws", &ctx).key_arns,
            vec!["arn:aws:kms:eu-west-1:111111111111:key/key-1"]
        );
    }

    #[tokio::test]
    async fn test_imported_key_is_not_managed() {
        let store = Arc::new(store());
        let manager = manager(store, Arc::new(RecordingAlarmPublisher::default()));
        let mut ctx = share_context("R1");
        ctx.bucket.imported = true;

        let targets = manager.targets(&ctx).await.unwrap();
        assert!(targets.key_id.is_some());
        assert_eq!(targets.key_policy(&ctx), None);
    }

    #[tokio::test]
    async fn test_reconcile_retries_after_conflict() {
        let store = Arc::new(store().with_document(bucket_key(), marker("Existing")));
        store.inject_conflicts(bucket_key(), 2).await;
        let manager = manager(store.clone(), Arc::new(RecordingAlarmPublisher::default()));

        let mut calls = 0;
        let change = manager
            .reconcile_document(&bucket_key(), |_| {
                calls += 1;
                DocumentChange::Put(marker("Replaced"))
            })
            .await
            .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(change, DocumentChange::Put(marker("Replaced")));
        assert_eq!(store.document(&bucket_key()).await, Some(marker("Replaced")));
    }

    #[tokio::test]
    async fn test_reconcile_gives_up_after_max_retries() {
        let store = Arc::new(store().with_document(bucket_key(), marker("Existing")));
        store.inject_conflicts(bucket_key(), 10).await;
        let manager = manager(store.clone(), Arc::new(RecordingAlarmPublisher::default()));

        let err = manager
            .reconcile_document(&bucket_key(), |_| DocumentChange::Put(marker("Replaced")))
            .await
            .unwrap_err();

        assert!(matches!(err, ShareError::ConflictRetriesExhausted { attempts: 4, .. }));
        assert_eq!(store.document(&bucket_key()).await, Some(marker("Existing")));
    }

    #[tokio::test]
    async fn test_reconcile_delete_of_missing_document_is_noop() {
        let store = Arc::new(store());
        let manager = manager(store.clone(), Arc::new(RecordingAlarmPublisher::default()));

        let change = manager
            .reconcile_document(&identity_key("R1"), |_| DocumentChange::Delete)
            .await
            .unwrap();
        assert_eq!(change, DocumentChange::Delete);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_report_failure_wraps_error_and_alarms() {
        let alarms = Arc::new(RecordingAlarmPublisher::default());
        let manager = manager(Arc::new(store()), alarms.clone());
        let ctx = share_context("R1");

        let err = manager
            .report_failure(AlarmKind::Revoke, &ctx, ShareError::lifecycle("boom"))
            .await;
        assert!(matches!(err, ShareError::RevokeFailed { ref bucket, .. } if bucket == "b1"));

        let recorded = alarms.alarms.lock().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "ALARM: S3 Bucket b1 Sharing Revoke Failure Notification");
    }
}
