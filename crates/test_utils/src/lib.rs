use async_trait::async_trait;
use aws_lambda_events::s3::S3Event;
use model::policy::PolicyDefinition;
use model::request::PolicyRequest;
use model::{ChangeNotification, IdentityRecord};
use serde_json::{Value, json};
use service::{ConfigLoadError, ConfigurationLoader, RemotePolicyService, ServiceError};
use state::StoreErrorReason::Unavailable;
use state::{IdentityStore, StoreError, StoreOperation};
use state_in_memory::InMemoryIdentityStore;
use std::sync::Mutex;

pub const TEST_BUCKET: &str = "policies";
pub const TEST_KEY: &str = "orders.yaml";
pub const TEST_POLICY_ID: &str = "pol-001";

/// Policy definition with a single hourly schedule keeping five snapshots.
pub const SAMPLE_POLICY_YAML: &str = r#"
Description: Hourly order volume snapshots
ExecutionRoleArn: arn:aws:iam::123456789012:role/AWSDataLifecycleManagerDefaultRole
State: ENABLED
PolicyDetails:
  ResourceTypes: VOLUME
  TargetTags:
    - Key: app
      Value: orders
  Schedules:
    - Name: Hourly
      CreateRule:
        Interval: 1
        IntervalUnit: HOURS
      RetainRule:
        Count: 5
      TagsToAdd:
        - Key: managed-by
          Value: lifecycle-reconciler
"#;

pub fn sample_policy_definition() -> PolicyDefinition {
    serde_yaml::from_str(SAMPLE_POLICY_YAML).expect("Sample policy should parse")
}

/// The request expected from `sample_policy_definition`.
pub fn sample_policy_request() -> PolicyRequest {
    let definition: PolicyDefinition = sample_policy_definition();

    PolicyRequest {
        description: definition.description,
        execution_role_arn: definition.execution_role_arn,
        state: definition.state,
        resource_types: vec![definition.policy_details.resource_types],
        target_tags: definition.policy_details.target_tags,
        schedule: definition.policy_details.schedules[0].clone(),
    }
}

/// Build a notification for an object in the test bucket.
pub fn notification(object_key: &str, event_name: &str, event_time: &str) -> ChangeNotification {
    ChangeNotification {
        object_key: object_key.to_string(),
        bucket: TEST_BUCKET.to_string(),
        event_name: event_name.to_string(),
        event_time: event_time.to_string(),
        correlation_id: format!("req-{event_time}"),
    }
}

pub fn identity_record(object_key: &str, policy_id: &str, created_at: &str) -> IdentityRecord {
    IdentityRecord::new(object_key, policy_id, "req-initial", created_at)
}

/// A single S3 event record, as delivered to the Lambda.
pub fn s3_record(object_key: &str, event_name: &str, event_time: &str) -> Value {
    json!({
        "eventVersion": "2.1",
        "eventSource": "aws:s3",
        "awsRegion": "ap-southeast-2",
        "eventTime": event_time,
        "eventName": event_name,
        "userIdentity": { "principalId": "AWS:EXAMPLE" },
        "requestParameters": { "sourceIPAddress": "127.0.0.1" },
        "responseElements": {
            "x-amz-request-id": "EXAMPLE123456789",
            "x-amz-id-2": "EXAMPLE123/abcdefghijklmnopqrstuvwxyz"
        },
        "s3": {
            "s3SchemaVersion": "1.0",
            "configurationId": "policy-changes",
            "bucket": {
                "name": TEST_BUCKET,
                "ownerIdentity": { "principalId": "EXAMPLE" },
                "arn": format!("arn:aws:s3:::{TEST_BUCKET}")
            },
            "object": {
                "key": object_key,
                "size": 1024,
                "eTag": "0123456789abcdef0123456789abcdef",
                "sequencer": "0A1B2C3D4E5F678901"
            }
        }
    })
}

pub fn s3_event_with_records(records: Vec<Value>) -> S3Event {
    serde_json::from_value(json!({ "Records": records })).expect("S3 event should deserialize")
}

/// A call observed by `MockRemotePolicyService`.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Create(PolicyRequest),
    Update(PolicyRequest, String),
    Delete(String),
}

/// Remote service which records every call.
pub struct MockRemotePolicyService {
    policy_id: String,
    failing: bool,
    calls: Mutex<Vec<RemoteCall>>,
}

impl MockRemotePolicyService {
    /// Succeeds, handing out `policy_id` for created policies.
    pub fn returning(policy_id: &str) -> Self {
        MockRemotePolicyService {
            policy_id: policy_id.to_string(),
            failing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails after being recorded.
    pub fn failing() -> Self {
        MockRemotePolicyService {
            failing: true,
            ..Self::returning(TEST_POLICY_ID)
        }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().expect("Calls lock poisoned").clone()
    }

    fn record(&self, call: RemoteCall) -> Result<(), ServiceError> {
        self.calls.lock().expect("Calls lock poisoned").push(call);

        if self.failing {
            return Err(ServiceError::Upstream("mock service failure".into()));
        }

        Ok(())
    }
}

impl Default for MockRemotePolicyService {
    fn default() -> Self {
        Self::returning(TEST_POLICY_ID)
    }
}

#[async_trait]
impl RemotePolicyService for MockRemotePolicyService {
    fn name(&self) -> &'static str {
        "MockRemotePolicyService"
    }

    async fn create(&self, request: &PolicyRequest) -> Result<String, ServiceError> {
        self.record(RemoteCall::Create(request.clone()))?;

        Ok(self.policy_id.clone())
    }

    async fn update(&self, request: &PolicyRequest, policy_id: &str) -> Result<(), ServiceError> {
        self.record(RemoteCall::Update(request.clone(), policy_id.to_string()))
    }

    async fn delete(&self, policy_id: &str) -> Result<(), ServiceError> {
        self.record(RemoteCall::Delete(policy_id.to_string()))
    }
}

/// Loader serving one fixed definition, or failing when none is set.
pub struct MockConfigurationLoader {
    definition: Option<PolicyDefinition>,
    loads: Mutex<Vec<String>>,
}

impl MockConfigurationLoader {
    pub fn with_definition(definition: PolicyDefinition) -> Self {
        MockConfigurationLoader {
            definition: Some(definition),
            loads: Mutex::new(Vec::new()),
        }
    }

    pub fn missing() -> Self {
        MockConfigurationLoader {
            definition: None,
            loads: Mutex::new(Vec::new()),
        }
    }

    /// Object keys which were loaded, in order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().expect("Loads lock poisoned").clone()
    }
}

impl Default for MockConfigurationLoader {
    fn default() -> Self {
        Self::with_definition(sample_policy_definition())
    }
}

#[async_trait]
impl ConfigurationLoader for MockConfigurationLoader {
    async fn load(&self, _bucket: &str, object_key: &str) -> Result<PolicyDefinition, ConfigLoadError> {
        self.loads
            .lock()
            .expect("Loads lock poisoned")
            .push(object_key.to_string());

        self.definition
            .clone()
            .ok_or_else(|| ConfigLoadError::NotFound {
                object_key: object_key.to_string(),
            })
    }
}

/// In-memory store which records operations and can fail chosen ones.
#[derive(Default)]
pub struct RecordingIdentityStore {
    inner: InMemoryIdentityStore,
    failing: Vec<StoreOperation>,
    operations: Mutex<Vec<(StoreOperation, String)>>,
}

impl RecordingIdentityStore {
    pub fn new(inner: InMemoryIdentityStore) -> Self {
        RecordingIdentityStore {
            inner,
            ..Default::default()
        }
    }

    /// Fail `operation` with an unavailable backend.
    pub fn failing_on(mut self, operation: StoreOperation) -> Self {
        self.failing.push(operation);
        self
    }

    pub fn inner(&self) -> &InMemoryIdentityStore {
        &self.inner
    }

    /// Operations attempted against the store with their keys.
    pub fn operations(&self) -> Vec<(StoreOperation, String)> {
        self.operations.lock().expect("Operations lock poisoned").clone()
    }

    /// Count of mutating operations, lookups excluded.
    pub fn writes(&self) -> usize {
        self.operations()
            .iter()
            .filter(|(operation, _)| *operation != StoreOperation::FindByKey)
            .count()
    }

    fn record(&self, operation: StoreOperation, object_key: &str) -> Result<(), StoreError> {
        self.operations
            .lock()
            .expect("Operations lock poisoned")
            .push((operation, object_key.to_string()));

        if self.failing.contains(&operation) {
            return Err(StoreError::new(
                object_key,
                operation,
                Unavailable("mock store failure".into()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl IdentityStore for RecordingIdentityStore {
    async fn find_by_key(&self, object_key: &str) -> Result<Option<IdentityRecord>, StoreError> {
        self.record(StoreOperation::FindByKey, object_key)?;
        self.inner.find_by_key(object_key).await
    }

    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.record(StoreOperation::Create, &record.object_key)?;
        self.inner.create(record).await
    }

    async fn update(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.record(StoreOperation::Update, &record.object_key)?;
        self.inner.update(record).await
    }

    async fn delete(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.record(StoreOperation::Delete, &record.object_key)?;
        self.inner.delete(record).await
    }
}
