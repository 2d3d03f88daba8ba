pub mod client_builder;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::storage::{Storage, StorageTrait};
use crate::types::FailedKey;
use crate::types::error::{S3pruneError, is_throttling_error_code};

/// Extracts the S3 error code and message from an AWS SDK error.
///
/// For service errors (S3 API responses), returns the S3 error code
/// (e.g. "AccessDenied", "SlowDown") and the human-readable error
/// message from the response. For other error types (network, timeout,
/// construction failure), returns "N/A" as the code and the full error
/// description as the message.
fn extract_sdk_error_details<E: std::fmt::Display + ProvideErrorMetadata>(
    e: &SdkError<E>,
) -> (String, String) {
    if let Some(service_err) = e.as_service_error() {
        (
            service_err.code().unwrap_or("unknown").to_string(),
            service_err.message().unwrap_or("no message").to_string(),
        )
    } else {
        ("N/A".to_string(), e.to_string())
    }
}

pub struct S3StorageFactory;

impl S3StorageFactory {
    pub async fn create(bucket: String, client_config: Option<ClientConfig>) -> Result<Storage> {
        let client_config = client_config.ok_or_else(|| {
            anyhow!(S3pruneError::AwsConfig(
                "no S3 client configuration.".to_string()
            ))
        })?;
        let client = client_config.create_client().await?;

        Ok(Box::new(S3Storage {
            bucket,
            client: Arc::new(client),
        }))
    }
}

#[derive(Clone)]
struct S3Storage {
    bucket: String,
    client: Arc<Client>,
}

#[async_trait]
impl StorageTrait for S3Storage {
    async fn list_objects(
        &self,
        prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<Vec<String>> {
        let output = self
            .client
            .list_objects()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_marker(marker)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);
                tracing::error!(
                    bucket = self.bucket,
                    prefix = prefix,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 ListObjects API call failed for s3://{}/{}: {} ({}).",
                    self.bucket,
                    prefix,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context("aws_sdk_s3::client::list_objects() failed.")
            })?;

        let keys: Vec<String> = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        tracing::trace!(
            bucket = self.bucket,
            prefix = prefix,
            key_count = keys.len(),
            "listed a page of objects."
        );

        Ok(keys)
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<Vec<FailedKey>> {
        let object_count = keys.len();

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to build ObjectIdentifier")?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .context("Failed to build Delete request")?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                let (s3_error_code, s3_error_message) = extract_sdk_error_details(&e);

                if is_throttling_error_code(&s3_error_code) {
                    tracing::debug!(
                        bucket = self.bucket,
                        object_count = object_count,
                        s3_error_code = s3_error_code,
                        "S3 DeleteObjects API call was throttled."
                    );
                    return anyhow!(S3pruneError::Throttled {
                        code: s3_error_code,
                        message: s3_error_message,
                    });
                }

                tracing::error!(
                    bucket = self.bucket,
                    object_count = object_count,
                    s3_error_code = s3_error_code,
                    s3_error_message = s3_error_message,
                    "S3 DeleteObjects API call failed for {} objects in s3://{}: {} ({}).",
                    object_count,
                    self.bucket,
                    s3_error_code,
                    s3_error_message,
                );
                anyhow!(e).context("aws_sdk_s3::client::delete_objects() failed.")
            })?;

        Ok(output
            .errors()
            .iter()
            .map(|e| FailedKey {
                key: e.key().unwrap_or_default().to_string(),
                error_code: e.code().unwrap_or("unknown").to_string(),
                error_message: e.message().unwrap_or("no message").to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::types::S3Credentials;

    #[tokio::test]
    async fn create_storage_without_client_config_fails() {
        let e = S3StorageFactory::create("test-bucket".to_string(), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            e.downcast_ref::<S3pruneError>(),
            Some(S3pruneError::AwsConfig(_))
        ));
    }

    #[tokio::test]
    async fn create_storage_with_region() {
        let client_config = ClientConfig {
            credential: S3Credentials::FromEnvironment,
            region: Some("us-east-1".to_string()),
            endpoint_url: Some("http://localhost:9000".to_string()),
            force_path_style: true,
            retry_config: RetryConfig {
                aws_max_attempts: 1,
                initial_backoff_milliseconds: 100,
            },
        };

        let storage = S3StorageFactory::create("test-bucket".to_string(), Some(client_config)).await;
        assert!(storage.is_ok());
    }
}
