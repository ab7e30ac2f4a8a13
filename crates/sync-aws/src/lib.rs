//! AWS implementations of the worker's external collaborators.
//!
//! - [`S3ObjectStore`]: reads item objects
//! - [`SqsRetryQueue`]: receives and deletes dead-lettered events
//! - [`LambdaInvoker`]: requests the next drain hop
//!
//! All clients share one [`aws_config::SdkConfig`] loaded by
//! [`load_sdk_config`], so credentials and region come from the usual
//! provider chain unless overridden in settings.

pub mod lambda;
pub mod s3;
pub mod sqs;

pub use lambda::LambdaInvoker;
pub use s3::S3ObjectStore;
pub use sqs::SqsRetryQueue;

pub use aws_config::SdkConfig;

use aws_config::{BehaviorVersion, Region};
use sync_types::ObjectStoreSettings;

/// Load the shared SDK config, applying region and endpoint overrides.
pub async fn load_sdk_config(settings: &ObjectStoreSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &settings.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_sdk_config_applies_overrides() {
        let settings = ObjectStoreSettings {
            region: Some("eu-west-1".to_string()),
            endpoint_url: Some("http://localhost:4566".to_string()),
        };

        let config = load_sdk_config(&settings).await;

        assert_eq!(config.region().map(|r| r.as_ref()), Some("eu-west-1"));
        assert_eq!(config.endpoint_url(), Some("http://localhost:4566"));
    }
}
