use aws_config::{BehaviorVersion, SdkConfig};
use lambda_runtime::{Error, service_fn, tracing};
use reconcile::config::{ReconcilerConfig, StoreBackend};
use reconcile::engine::ReconciliationEngine;
use reconcile::{ReconcileLambdaEvent, reconcile_fn};
use service_aws::{DlmPolicyService, S3PolicyLoader};
use state::{IdentityStore, StoreConfig};
use state_dynamodb::DynamoDbIdentityStore;
use state_in_memory::InMemoryIdentityStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config: ReconcilerConfig = ReconcilerConfig::from_env()?;
    let sdk_config: SdkConfig = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let store: Arc<dyn IdentityStore> = match config.store_backend {
        StoreBackend::DynamoDb => dynamodb_store(&sdk_config, config.store.clone()),
        StoreBackend::InMemory => in_memory_store(),
    };

    tracing::info!(
        backend = ?config.store_backend,
        table_name = %config.store.table_name,
        "Starting lifecycle policy reconciler"
    );

    let engine: ReconciliationEngine = ReconciliationEngine::new(
        store,
        Arc::new(S3PolicyLoader::new(aws_sdk_s3::Client::new(&sdk_config))),
        Arc::new(DlmPolicyService::new(aws_sdk_dlm::Client::new(&sdk_config))),
    );

    let engine: &ReconciliationEngine = &engine;

    lambda_runtime::run(service_fn(move |event: ReconcileLambdaEvent| async move {
        reconcile_fn(engine, event).await
    }))
    .await
}

fn dynamodb_store(sdk_config: &SdkConfig, config: StoreConfig) -> Arc<dyn IdentityStore> {
    Arc::new(DynamoDbIdentityStore::new(
        aws_sdk_dynamodb::Client::new(sdk_config),
        config,
    ))
}

// Mappings only live as long as the execution environment
fn in_memory_store() -> Arc<dyn IdentityStore> {
    tracing::warn!("Using an in-memory identity store, mappings will not persist");

    Arc::new(InMemoryIdentityStore::default())
}
