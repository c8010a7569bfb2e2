//! # AWS Secrets Manager Authentication
//!
//! Handles AWS SDK configuration. Credentials and region come from the
//! default provider chain (the function's execution role when deployed).

use anyhow::Result;
use aws_config::SdkConfig;
use tracing::info;

/// Create AWS SDK config using the default credential chain
///
/// `endpoint` overrides the Secrets Manager endpoint, typically a VPC
/// interface endpoint when the function runs without internet egress.
pub async fn create_sdk_config(endpoint: Option<&str>) -> Result<SdkConfig> {
    let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

    if let Some(endpoint) = endpoint {
        info!(
            endpoint = endpoint,
            "Using Secrets Manager endpoint override: {}", endpoint
        );
        builder = builder.endpoint_url(endpoint);
    }

    let sdk_config = builder.load().await;

    Ok(sdk_config)
}
