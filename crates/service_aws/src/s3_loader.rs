use async_trait::async_trait;
use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
use lambda_runtime::tracing;
use model::policy::PolicyDefinition;
use service::{ConfigLoadError, ConfigurationLoader};

/// Loads YAML policy definitions from S3.
#[derive(Clone)]
pub struct S3PolicyLoader {
    s3_client: aws_sdk_s3::Client,
}

impl S3PolicyLoader {
    pub fn new(s3_client: aws_sdk_s3::Client) -> Self {
        S3PolicyLoader { s3_client }
    }
}

#[async_trait]
impl ConfigurationLoader for S3PolicyLoader {
    async fn load(&self, bucket: &str, object_key: &str) -> Result<PolicyDefinition, ConfigLoadError> {
        tracing::debug!(bucket, object_key, "Fetching policy definition");

        let output: GetObjectOutput = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|err| {
                let missing: bool = err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key);

                if missing {
                    ConfigLoadError::NotFound {
                        object_key: object_key.to_string(),
                    }
                } else {
                    ConfigLoadError::Unavailable {
                        object_key: object_key.to_string(),
                        source: err.into(),
                    }
                }
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| ConfigLoadError::Unavailable {
                object_key: object_key.to_string(),
                source: err.into(),
            })?
            .into_bytes();

        serde_yaml::from_slice(&body).map_err(|err| ConfigLoadError::Malformed {
            object_key: object_key.to_string(),
            reason: err.to_string(),
        })
    }
}
