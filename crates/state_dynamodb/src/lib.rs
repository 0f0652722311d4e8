use async_trait::async_trait;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemOutput;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::AttributeValue;
use model::IdentityRecord;
use state::StoreErrorReason::{BadState, DuplicateKey, NotFound, Unavailable};
use state::StoreOperation::{Create, Delete, FindByKey, Update};
use state::{IdentityStore, StoreConfig, StoreError};
use std::collections::HashMap;

// Attribute names, these must match the serialised `IdentityRecord`
const OBJECT_KEY: &str = "s3objectkey";
const POLICY_ID: &str = "policyid";
const REQUEST_ID: &str = "requestid";
const UPDATED_AT: &str = "updatedat";

/// Identity store backed by a DynamoDB table keyed on the object key.
///
/// Every mutation is a conditional write, so two writers racing on one key
/// can't silently overwrite each other: one of them fails instead.
pub struct DynamoDbIdentityStore {
    table_name: String,
    dynamodb_client: aws_sdk_dynamodb::Client,
    consistent_read: bool,
}

impl DynamoDbIdentityStore {
    pub fn new(dynamodb_client: aws_sdk_dynamodb::Client, config: StoreConfig) -> Self {
        DynamoDbIdentityStore {
            table_name: config.table_name,
            dynamodb_client,
            consistent_read: config.consistent_read,
        }
    }
}

#[async_trait]
impl IdentityStore for DynamoDbIdentityStore {
    async fn find_by_key(&self, object_key: &str) -> Result<Option<IdentityRecord>, StoreError> {
        let output: GetItemOutput = self
            .dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .consistent_read(self.consistent_read)
            .key(OBJECT_KEY, string_value(object_key))
            .send()
            .await
            .map_err(|err| StoreError::new(object_key, FindByKey, Unavailable(err.into())))?;

        let Some(item) = output.item else {
            return Ok(None);
        };

        let record: IdentityRecord = serde_dynamo::from_item(item)
            .map_err(|err| StoreError::new(object_key, FindByKey, BadState(err.to_string())))?;

        Ok(Some(record))
    }

    async fn create(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        let item: HashMap<String, AttributeValue> = serde_dynamo::to_item(record)
            .map_err(|err| StoreError::new(&record.object_key, Create, BadState(err.to_string())))?;

        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#K)")
            .expression_attribute_names("#K", OBJECT_KEY)
            .send()
            .await
            .map_err(|err| {
                let duplicate: bool = err
                    .as_service_error()
                    .is_some_and(PutItemError::is_conditional_check_failed_exception);

                if duplicate {
                    StoreError::new(&record.object_key, Create, DuplicateKey)
                } else {
                    StoreError::new(&record.object_key, Create, Unavailable(err.into()))
                }
            })?;

        Ok(())
    }

    async fn update(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.dynamodb_client
            .update_item()
            .table_name(&self.table_name)
            .key(OBJECT_KEY, string_value(&record.object_key))
            .update_expression("SET #RI = :r, #UA = :u")
            // Don't touch a mapping replaced since it was read
            .condition_expression("attribute_exists(#K) AND #P = :p")
            .expression_attribute_names("#K", OBJECT_KEY)
            .expression_attribute_names("#P", POLICY_ID)
            .expression_attribute_names("#RI", REQUEST_ID)
            .expression_attribute_names("#UA", UPDATED_AT)
            .expression_attribute_values(":p", string_value(&record.remote_policy_id))
            .expression_attribute_values(":r", string_value(&record.request_id))
            .expression_attribute_values(":u", string_value(&record.updated_at))
            .send()
            .await
            .map_err(|err| {
                let missing: bool = err
                    .as_service_error()
                    .is_some_and(UpdateItemError::is_conditional_check_failed_exception);

                if missing {
                    StoreError::new(&record.object_key, Update, NotFound)
                } else {
                    StoreError::new(&record.object_key, Update, Unavailable(err.into()))
                }
            })?;

        Ok(())
    }

    async fn delete(&self, record: &IdentityRecord) -> Result<(), StoreError> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .key(OBJECT_KEY, string_value(&record.object_key))
            // Don't remove a mapping replaced since it was read
            .condition_expression("attribute_exists(#K) AND #P = :p")
            .expression_attribute_names("#K", OBJECT_KEY)
            .expression_attribute_names("#P", POLICY_ID)
            .expression_attribute_values(":p", string_value(&record.remote_policy_id))
            .send()
            .await
            .map_err(|err| {
                let missing: bool = err
                    .as_service_error()
                    .is_some_and(DeleteItemError::is_conditional_check_failed_exception);

                if missing {
                    StoreError::new(&record.object_key, Delete, NotFound)
                } else {
                    StoreError::new(&record.object_key, Delete, Unavailable(err.into()))
                }
            })?;

        Ok(())
    }
}

fn string_value(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}
