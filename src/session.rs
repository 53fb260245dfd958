//! AWS connection settings.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

use crate::crypto::KmsEncryptor;
use crate::store::DynamoDbStore;

/// Region, profile and DynamoDB endpoint, from flags or the environment.
/// Unset values fall back to the standard AWS provider chains.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct AwsSettings {
    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Named profile from the shared AWS config
    #[arg(long, global = true, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// DynamoDB endpoint, e.g. http://localhost:8000 for DynamoDB Local
    #[arg(long, global = true, env = "DYNAMODB_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

impl AwsSettings {
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }

    /// Builds the two remote capabilities. The endpoint override applies to
    /// DynamoDB only; KMS always uses the regional endpoint.
    pub async fn connect(&self) -> (DynamoDbStore, KmsEncryptor) {
        let config = self.load().await;
        debug!(
            region = ?config.region(),
            endpoint_url = ?self.endpoint_url,
            "AWS configuration loaded"
        );
        (
            DynamoDbStore::new(&config, self.endpoint_url.as_deref()),
            KmsEncryptor::new(&config),
        )
    }
}
