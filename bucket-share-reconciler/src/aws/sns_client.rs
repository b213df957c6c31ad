//! Alarm delivery through an SNS topic

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client as SnsClient;
use aws_types::region::Region;
use log::info;

use crate::alarm::AlarmPublisher;
use crate::aws::{AwsError, AwsResult};

/// SNS rejects subjects longer than this.
const MAX_SUBJECT_LEN: usize = 100;

pub struct SnsAlarmPublisher {
    client: SnsClient,
    topic_arn: String,
}

impl SnsAlarmPublisher {
    /// Publisher for `topic_arn`. The client is pinned to the topic's region
    /// when the ARN names one.
    pub fn new(config: &SdkConfig, topic_arn: impl Into<String>) -> Self {
        let topic_arn = topic_arn.into();
        let client = match topic_region(&topic_arn) {
            Some(region) => SnsClient::new(
                &config
                    .to_builder()
                    .region(Region::new(region.to_string()))
                    .build(),
            ),
            None => SnsClient::new(config),
        };
        Self { client, topic_arn }
    }
}

fn topic_region(topic_arn: &str) -> Option<&str> {
    topic_arn
        .split(':')
        .nth(3)
        .filter(|region| !region.is_empty())
}

fn truncate_subject(subject: &str) -> &str {
    match subject.char_indices().nth(MAX_SUBJECT_LEN) {
        Some((end, _)) => &subject[..end],
        None => subject,
    }
}

#[async_trait]
impl AlarmPublisher for SnsAlarmPublisher {
    async fn publish(&self, subject: &str, message: &str) -> AwsResult<()> {
        let response = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(truncate_subject(subject))
            .message(message)
            .send()
            .await
            .map_err(|e| {
                AwsError::SnsError(format!("Failed to publish to {}: {e}", self.topic_arn))
            })?;
        info!(
            "Published alarm to {} (message id {:?})",
            self.topic_arn,
            response.message_id()
        );
        Ok(())
    }
}
