//! Grant logic for the bucket share service

use log::{debug, info};

use super::service::{ShareManager, ShareTargets};
use crate::alarm::AlarmKind;
use crate::arn::role_arn;
use crate::error::{ShareError, ShareResult};
use crate::models::ShareContext;
use crate::synthesis::policy_builder::build_owner_statement;
use crate::synthesis::{grant_bucket_policy, grant_identity_policy, grant_key_policy};
use crate::types::Statement;

impl ShareManager {
    /// Grant the share's requester read access to the bucket. Returns whether
    /// the grant succeeded; failures have already been logged and alarmed.
    pub async fn process_approved_share(&self, ctx: &ShareContext) -> bool {
        self.try_process_approved_share(ctx).await.is_ok()
    }

    /// Grant the share's requester read access to the bucket:
    /// 1. its identity-role policy gains the bucket (and key) ARNs,
    /// 2. the bucket policy lists it in the read-only statement and carries
    ///    the owner statement,
    /// 3. the key policy lets it decrypt, when this system manages the key.
    ///
    /// Every step is idempotent, so a failed grant is completed by running it
    /// again; nothing is rolled back.
    ///
    /// # Errors
    ///
    /// `InvalidContext` when the context is incomplete (no alarm is raised),
    /// otherwise `ShareFailed` wrapping the error of the step that failed.
    pub async fn try_process_approved_share(&self, ctx: &ShareContext) -> ShareResult<()> {
        ctx.validate()?;
        info!(
            "Granting {} access to bucket {} for share {}",
            ctx.share.principal_iam_role_name, ctx.bucket.s3_bucket_name, ctx.share.share_uri
        );
        match self.grant(ctx).await {
            Ok(()) => {
                info!(
                    "Bucket {} shared for share {}",
                    ctx.bucket.s3_bucket_name, ctx.share.share_uri
                );
                Ok(())
            }
            Err(e) => Err(self.report_failure(AlarmKind::Share, ctx, e).await),
        }
    }

    async fn grant(&self, ctx: &ShareContext) -> ShareResult<()> {
        let targets = self.targets(ctx).await?;

        let sids = self.config.identity_policy_sids();
        let resources = targets.identity_resources(&self.config.partition, ctx);
        self.reconcile_document(&targets.identity_policy, |existing| {
            grant_identity_policy(existing, &sids, &resources)
        })
        .await?;

        self.grant_bucket_policy(ctx, &targets).await?;

        if let Some(key_policy) = targets.key_policy(ctx) {
            if let Some(role_id) = self.requester_role_id(ctx).await? {
                self.reconcile_document(&key_policy, |existing| {
                    grant_key_policy(existing, &role_id)
                })
                .await?;
            }
        }
        Ok(())
    }

    /// The owner statement is resolved up front on every grant: a retry may
    /// re-read a policy from which another writer removed it.
    async fn grant_bucket_policy(
        &self,
        ctx: &ShareContext,
        targets: &ShareTargets,
    ) -> ShareResult<()> {
        let sids = self.config.bucket_policy_sids();
        let owner = self.owner_statement(ctx, targets).await?;

        self.reconcile_document(&targets.bucket_policy, |existing| {
            grant_bucket_policy(
                existing,
                &sids,
                &targets.bucket_arns,
                &targets.requester_arn,
                &owner,
            )
        })
        .await?;
        Ok(())
    }

    /// Owner statement for the bucket: the dataset admin role, the source
    /// environment admin role and the account's delegation role, by unique id.
    async fn owner_statement(
        &self,
        ctx: &ShareContext,
        targets: &ShareTargets,
    ) -> ShareResult<Statement> {
        let account_id = &ctx.bucket.aws_account_id;
        let owner_roles = vec![
            ctx.dataset.iam_dataset_admin_role_arn.clone(),
            ctx.source_env_group.environment_iam_role_arn.clone(),
            role_arn(&self.config.partition, account_id, &self.config.delegation_role_name),
        ];
        let role_ids = self.resolver.resolve_role_ids(account_id, &owner_roles).await?;
        if role_ids.is_empty() {
            return Err(ShareError::UnresolvedOwnerRoles {
                account_id: account_id.clone(),
                roles: owner_roles,
            });
        }
        debug!("Owner statement of {} covers {role_ids:?}", targets.bucket_policy);
        Ok(build_owner_statement(&self.config.owner_sid, &targets.bucket_arns, &role_ids))
    }
}
