use async_trait::async_trait;
use model::IdentityRecord;
use state::StoreErrorReason::{DuplicateKey, NotFound, Unavailable};
use state::StoreOperation::{Create, Delete, FindByKey, Update};
use state::{IdentityStore, StoreError, StoreOperation};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identity store held in process memory.
/// Records are lost when the process exits, so this suits tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryIdentityStore {
    records: Arc<Mutex<HashMap<String, IdentityRecord>>>,
}

impl InMemoryIdentityStore {
    /// Create a store pre-populated with records.
    pub fn with_records(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        let records: HashMap<String, IdentityRecord> = records
            .into_iter()
            .map(|record| (record.object_key.clone(), record))
            .collect();

        InMemoryIdentityStore {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|guard| guard.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(
        &self,
        object_key: &str,
        operation: StoreOperation,
    ) -> Result<MutexGuard<'_, HashMap<String, IdentityRecord>>, StoreError> {
        self.records.lock().map_err(|err| {
            StoreError::new(object_key, operation, Unavailable(err.to_string().into()))
        })
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_key(&self, object_key: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let guard = self.guard(object_key, FindByKey)?;

        Ok(guard.get(object_key).cloned())
    }

    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let mut guard = self.guard(&record.object_key, Create)?;

        if guard.contains_key(&record.object_key) {
            return Err(StoreError::new(&record.object_key, Create, DuplicateKey));
        }

        guard.insert(record.object_key.clone(), record.clone());

        Ok(())
    }

    async fn update(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let mut guard = self.guard(&record.object_key, Update)?;

        // A mapping recreated for another policy since it was read counts as missing
        let existing: &mut IdentityRecord = guard
            .get_mut(&record.object_key)
            .filter(|existing| existing.remote_policy_id == record.remote_policy_id)
            .ok_or_else(|| StoreError::new(&record.object_key, Update, NotFound))?;

        existing.request_id = record.request_id.clone();
        existing.updated_at = record.updated_at.clone();

        Ok(())
    }

    async fn delete(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let mut guard = self.guard(&record.object_key, Delete)?;

        // Only remove the mapping the caller observed
        let observed: bool = guard
            .get(&record.object_key)
            .is_some_and(|existing| existing.remote_policy_id == record.remote_policy_id);

        if !observed {
            return Err(StoreError::new(&record.object_key, Delete, NotFound));
        }

        guard.remove(&record.object_key);

        Ok(())
    }
}
