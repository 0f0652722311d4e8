use ::model::Error;
use async_trait::async_trait;
use model::IdentityRecord;
use std::fmt::{Display, Formatter};

/// Default table holding identity records.
pub const DEFAULT_TABLE_NAME: &str = "adlm-helper";

/// Durable mapping from configuration object keys to remote policy ids.
///
/// A record exists for a key exactly when a remote policy exists for it.
/// Implementations must reject concurrent conflicting mutations of one key
/// rather than silently overwrite: `create` fails on an existing key and
/// `update`/`delete` fail on a missing one.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Absence is `Ok(None)`, never an error.
    async fn find_by_key(&self, object_key: &str) -> Result<Option<IdentityRecord>, StoreError>;

    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError>;

    /// Only `request_id` and `updated_at` are written.
    async fn update(&self, record: &IdentityRecord) -> Result<(), StoreError>;

    async fn delete(&self, record: &IdentityRecord) -> Result<(), StoreError>;
}

/// Settings used when constructing a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub table_name: String,
    pub consistent_read: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            consistent_read: true,
        }
    }
}

/// Errors arising from reading or writing identity records.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed for [{state_key}]: {reason}")]
pub struct StoreError {
    pub state_key: String,

    pub operation: StoreOperation,
    pub reason: StoreErrorReason,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreErrorReason {
    // No record exists for the key
    #[error("no record exists")]
    NotFound,
    // A record already exists for the key
    #[error("a record already exists")]
    DuplicateKey,
    // The stored record couldn't be converted
    #[error("bad state: {0}")]
    BadState(String),
    // An error from the underlying store
    #[error("backend unavailable: {0}")]
    Unavailable(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    FindByKey,
    Create,
    Update,
    Delete,
}

impl Display for StoreOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("{:?}", self).as_str())
    }
}

impl StoreError {
    pub fn new(state_key: impl Into<String>, operation: StoreOperation, reason: StoreErrorReason) -> Self {
        StoreError {
            state_key: state_key.into(),
            operation,
            reason,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.reason, StoreErrorReason::NotFound)
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self.reason, StoreErrorReason::DuplicateKey)
    }
}
