//! Failure alarms for bucket share and revoke operations.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use crate::aws::AwsResult;
use crate::models::ShareContext;

/// Delivery channel for operator alarms.
#[async_trait]
pub trait AlarmPublisher: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> AwsResult<()>;
}

/// Used when no alarm topic is configured: the alarm only reaches the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlarmPublisher;

#[async_trait]
impl AlarmPublisher for LogAlarmPublisher {
    async fn publish(&self, subject: &str, message: &str) -> AwsResult<()> {
        warn!("{subject}\n{message}");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    Share,
    Revoke,
}

impl AlarmKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Share => "Share",
            Self::Revoke => "Sharing Revoke",
        }
    }
}

pub struct ShareAlarmService {
    publisher: Arc<dyn AlarmPublisher>,
    environment_name: String,
    region: String,
}

impl ShareAlarmService {
    pub fn new(
        publisher: Arc<dyn AlarmPublisher>,
        environment_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            environment_name: environment_name.into(),
            region: region.into(),
        }
    }

    /// Subject and body of the alarm for a failed share or revoke.
    pub fn render(
        &self,
        kind: AlarmKind,
        ctx: &ShareContext,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> (String, String) {
        let action = kind.label();
        let bucket = &ctx.bucket;
        let target = &ctx.target_environment;
        let subject = format!(
            "ALARM: S3 Bucket {} {action} Failure Notification",
            bucket.s3_bucket_name
        );
        let message = format!(
            "You are receiving this email because your {env} environment in the {region} \
             region has entered the ALARM state, because it failed to {action} the S3 \
             Bucket {name}.
Alarm Details:
    - State Change:               OK -> ALARM
    - Reason for State Change:    S3 Bucket {action} failure
    - Timestamp:                  {timestamp}
    Share Source
    - Dataset URI:                {dataset}
    - AWS Account:                {source_account}
    - Region:                     {source_region}
    - S3 Bucket:                  {name}
    Share Target
    - AWS Account:                {target_account}
    - Region:                     {target_region}
",
            env = self.environment_name,
            region = self.region,
            name = bucket.s3_bucket_name,
            dataset = ctx.share.dataset_uri,
            source_account = bucket.aws_account_id,
            source_region = bucket.region,
            target_account = target.aws_account_id,
            target_region = target.region,
        );
        (subject, message)
    }

    /// Publish the alarm. Returns whether delivery succeeded; a delivery
    /// failure is logged and never replaces the error being reported.
    pub async fn trigger_bucket_sharing_failure_alarm(
        &self,
        kind: AlarmKind,
        ctx: &ShareContext,
    ) -> bool {
        info!("Triggering {} failure alarm...", kind.label());
        let (subject, message) = self.render(kind, ctx, chrono::Utc::now());
        match self.publisher.publish(&subject, &message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to publish alarm '{subject}': {e}");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingAlarmPublisher;
    use super::*;
    use crate::models::fixtures::share_context;
    use chrono::TimeZone;

    #[test]
    fn test_render_revoke_alarm() {
        let service = ShareAlarmService::new(Arc::new(LogAlarmPublisher), "prod", "eu-west-1");
        let timestamp = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let (subject, message) = service.render(AlarmKind::Revoke, &share_context("R1"), timestamp);

        assert_eq!(subject, "ALARM: S3 Bucket b1 Sharing Revoke Failure Notification");
        assert!(message.contains("your prod environment in the eu-west-1 region"));
        assert!(message.contains("failed to Sharing Revoke the S3 Bucket b1"));
        assert!(message.contains("Dataset URI:                ds-1"));
        assert!(message.contains("AWS Account:                222222222222"));
        assert!(message.contains("2024-05-01 12:00:00 UTC"));
    }

    #[tokio::test]
    async fn test_trigger_reports_delivery_outcome() {
        let ok = Arc::new(RecordingAlarmPublisher::default());
        let service = ShareAlarmService::new(ok.clone(), "dev", "eu-west-1");
        assert!(service
            .trigger_bucket_sharing_failure_alarm(AlarmKind::Share, &share_context("R1"))
            .await);
        assert_eq!(ok.alarms.lock().await.len(), 1);

        let failing = Arc::new(RecordingAlarmPublisher {
            fail: true,
            ..Default::default()
        });
        let service = ShareAlarmService::new(failing, "dev", "eu-west-1");
        assert!(!service
            .trigger_bucket_sharing_failure_alarm(AlarmKind::Share, &share_context("R1"))
            .await);
    }
}
