use std::time::Duration;

use anyhow::{Result, anyhow};
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::Client;

use crate::config::ClientConfig;
use crate::types::S3Credentials;
use crate::types::error::S3pruneError;

impl ClientConfig {
    /// Build an S3 client from this configuration.
    ///
    /// Fails with [`S3pruneError::AwsConfig`] when no region can be resolved
    /// from the flag, the profile, or the environment.
    pub async fn create_client(&self) -> Result<Client> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let S3Credentials::Profile(ref profile_name) = self.credential {
            loader = loader.profile_name(profile_name);
        }
        if let Some(ref region) = self.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        let sdk_config = loader.load().await;
        if sdk_config.region().is_none() {
            return Err(anyhow!(S3pruneError::AwsConfig(
                "no AWS region configured. use --region or set AWS_REGION.".to_string()
            )));
        }

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .retry_config(self.build_retry_config());

        if let Some(ref endpoint_url) = self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        Ok(Client::from_conf(builder.build()))
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn make_client_config(region: Option<&str>) -> ClientConfig {
        ClientConfig {
            credential: S3Credentials::FromEnvironment,
            region: region.map(str::to_string),
            endpoint_url: Some("http://localhost:9000".to_string()),
            force_path_style: true,
            retry_config: config::RetryConfig {
                aws_max_attempts: 5,
                initial_backoff_milliseconds: 200,
            },
        }
    }

    #[tokio::test]
    async fn create_client_with_explicit_region() {
        let client = make_client_config(Some("eu-west-1")).create_client().await;
        let client = client.unwrap();
        assert_eq!(
            client.config().region().map(|r| r.to_string()),
            Some("eu-west-1".to_string())
        );
    }

    #[test]
    fn retry_config_follows_client_config() {
        let retry_config = make_client_config(None).build_retry_config();
        assert_eq!(retry_config.max_attempts(), 5);
        assert_eq!(retry_config.initial_backoff(), Duration::from_millis(200));
    }
}
