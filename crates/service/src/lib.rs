use async_trait::async_trait;
use model::Error;
use model::policy::PolicyDefinition;
use model::request::PolicyRequest;

/// Fetches and parses the configuration object behind a notification.
#[async_trait]
pub trait ConfigurationLoader: Send + Sync {
    async fn load(&self, bucket: &str, object_key: &str) -> Result<PolicyDefinition, ConfigLoadError>;
}

/// Mutating operations against the remote lifecycle management service.
///
/// Failures are opaque to callers and are never retried here.
#[async_trait]
pub trait RemotePolicyService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the id assigned to the new policy.
    async fn create(&self, request: &PolicyRequest) -> Result<String, ServiceError>;

    async fn update(&self, request: &PolicyRequest, policy_id: &str) -> Result<(), ServiceError>;

    async fn delete(&self, policy_id: &str) -> Result<(), ServiceError>;
}

/// Errors loading a configuration object.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("configuration object [{object_key}] not found")]
    NotFound { object_key: String },
    // The object couldn't be parsed as a policy definition
    #[error("configuration object [{object_key}] is malformed: {reason}")]
    Malformed { object_key: String, reason: String },
    // The definition parsed but can't produce a policy
    #[error("configuration object [{object_key}] is invalid: {reason}")]
    Invalid { object_key: String, reason: String },
    #[error("configuration object [{object_key}] could not be fetched: {source}")]
    Unavailable { object_key: String, source: Error },
}

/// Errors from the remote lifecycle management service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    // The request couldn't be turned into a valid service call
    #[error("bad request: {0}")]
    BadRequest(String),
    // The service returned an invalid response
    #[error("bad response: {0}")]
    BadResponse(String),
    #[error("no policy id returned when creating policy")]
    MissingPolicyId,
    // An error returned by the service or its transport
    #[error("service call failed: {0}")]
    Upstream(Error),
}
