//! Per-account SDK configuration.
//!
//! Obtaining credentials for another account (assuming a delegation role,
//! ...) is the deployment's business: it plugs in its own
//! [`SessionProvider`]. The provider shipped here serves the account of the
//! ambient credentials only and refuses every other account.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::Client as StsClient;
use aws_types::region::Region;
use log::debug;
use tokio::sync::OnceCell;

use crate::aws::sts::caller_account_id;
use crate::aws::{AwsError, AwsResult};

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// SDK configuration with credentials for `account_id`, pinned to `region`.
    async fn config_for(&self, account_id: &str, region: &str) -> AwsResult<SdkConfig>;
}

pub struct CallerAccountSessionProvider {
    config: SdkConfig,
    caller_account: OnceCell<String>,
}

impl CallerAccountSessionProvider {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            caller_account: OnceCell::new(),
        }
    }

    /// Load configuration using the standard credential provider chain.
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::new(config)
    }

    async fn caller_account(&self) -> AwsResult<&str> {
        let account = self
            .caller_account
            .get_or_try_init(|| async { caller_account_id(&StsClient::new(&self.config)).await })
            .await?;
        Ok(account.as_str())
    }
}

#[async_trait]
impl SessionProvider for CallerAccountSessionProvider {
    async fn config_for(&self, account_id: &str, region: &str) -> AwsResult<SdkConfig> {
        let caller = self.caller_account().await?;
        if caller != account_id {
            return Err(AwsError::AccountMismatch {
                requested: account_id.to_string(),
                caller: caller.to_string(),
            });
        }
        debug!("Using ambient credentials of {caller} in {region}");
        Ok(self
            .config
            .to_builder()
            .region(Region::new(region.to_string()))
            .build())
    }
}
