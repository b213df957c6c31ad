//! Revoke logic for the bucket share service

use log::info;

use super::service::ShareManager;
use crate::alarm::AlarmKind;
use crate::error::ShareResult;
use crate::models::ShareContext;
use crate::synthesis::{revoke_bucket_policy, revoke_identity_policy, revoke_key_policy};

impl ShareManager {
    /// Withdraw the requester's access to the bucket. Returns whether the
    /// revoke succeeded; failures have already been logged and alarmed.
    pub async fn process_revoked_share(&self, ctx: &ShareContext) -> bool {
        self.try_process_revoked_share(ctx).await.is_ok()
    }

    /// Inverse of [`ShareManager::try_process_approved_share`], step by step
    /// in the same order. Anything already absent is skipped. The bucket's
    /// owner statement is never removed.
    ///
    /// # Errors
    ///
    /// `InvalidContext` when the context is incomplete (no alarm is raised),
    /// otherwise `RevokeFailed` wrapping the error of the step that failed.
    pub async fn try_process_revoked_share(&self, ctx: &ShareContext) -> ShareResult<()> {
        ctx.validate()?;
        info!(
            "Revoking {} access to bucket {} for share {}",
            ctx.share.principal_iam_role_name, ctx.bucket.s3_bucket_name, ctx.share.share_uri
        );
        match self.revoke(ctx).await {
            Ok(()) => {
                info!(
                    "Bucket {} revoked for share {}",
                    ctx.bucket.s3_bucket_name, ctx.share.share_uri
                );
                Ok(())
            }
            Err(e) => Err(self.report_failure(AlarmKind::Revoke, ctx, e).await),
        }
    }

    async fn revoke(&self, ctx: &ShareContext) -> ShareResult<()> {
        let targets = self.targets(ctx).await?;

        let sids = self.config.identity_policy_sids();
        let resources = targets.identity_resources(&self.config.partition, ctx);
        self.reconcile_document(&targets.identity_policy, |existing| {
            revoke_identity_policy(existing, &sids, &resources)
        })
        .await?;

        let sids = self.config.bucket_policy_sids();
        self.reconcile_document(&targets.bucket_policy, |existing| {
            revoke_bucket_policy(existing, &sids, &targets.requester_arn)
        })
        .await?;

        if let Some(key_policy) = targets.key_policy(ctx) {
            if let Some(role_id) = self.requester_role_id(ctx).await? {
                self.reconcile_document(&key_policy, |existing| {
                    revoke_key_policy(existing, &role_id)
                })
                .await?;
            }
        }
        Ok(())
    }
}
