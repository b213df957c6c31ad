//! ARN construction and parsing for the resources a share touches.

pub fn role_arn(partition: &str, account_id: &str, role_name: &str) -> String {
    format!("arn:{partition}:iam::{account_id}:role/{role_name}")
}

/// Bucket-level and object-level ARNs of a bucket, in that order.
pub fn bucket_arns(partition: &str, bucket_name: &str) -> Vec<String> {
    vec![
        format!("arn:{partition}:s3:::{bucket_name}"),
        format!("arn:{partition}:s3:::{bucket_name}/*"),
    ]
}

pub fn key_arn(partition: &str, region: &str, account_id: &str, key_id: &str) -> String {
    format!("arn:{partition}:kms:{region}:{account_id}:key/{key_id}")
}

/// Role name of an IAM role ARN, ignoring any role path.
pub fn role_name_from_arn(arn: &str) -> Option<String> {
    let resource = arn.splitn(6, ':').nth(5)?;
    let path = resource.strip_prefix("role/")?;
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
