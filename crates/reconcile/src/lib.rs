use crate::batch_handler::{BatchReport, BatchSummary, handle_batch, notifications_from_event};
use crate::engine::ReconciliationEngine;
use aws_lambda_events::s3::S3Event;
use lambda_runtime::{Error, LambdaEvent, tracing};
use model::ChangeNotification;

pub mod batch_handler;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
mod strategy;

pub use strategy::{DRIFT_TARGET, build_policy_request};

pub type ReconcileLambdaEvent = LambdaEvent<S3Event>;

/// Lambda handler reconciling every record of an S3 event.
///
/// Use with `lambda_runtime::run()`. Each record is reconciled independently;
/// if any fail, the invocation fails with the number of failed records after
/// the whole batch has been processed.
///
/// ```no_compile
/// use lambda_runtime::service_fn;
/// use reconcile::{ReconcileLambdaEvent, reconcile_fn};
///
/// let engine: ReconciliationEngine = ReconciliationEngine::new(store, loader, remote);
///
/// lambda_runtime::run(service_fn(|event: ReconcileLambdaEvent| async {
///     reconcile_fn(&engine, event).await
/// }))
/// .await?;
/// ```
pub async fn reconcile_fn(
    engine: &ReconciliationEngine,
    event: ReconcileLambdaEvent,
) -> Result<BatchSummary, Error> {
    let correlation_id: &str = &event.context.request_id;

    let (notifications, dropped): (Vec<ChangeNotification>, usize) =
        notifications_from_event(&event.payload, correlation_id);

    let mut report: BatchReport = handle_batch(engine, notifications).await;
    report.skipped += dropped;

    if report.failure_count() > 0 {
        tracing::error!(
            failed = report.failure_count(),
            drifted = report.drift_count(),
            "Failed to process [{}] records",
            report.failure_count()
        );

        return Err(format!(
            "Failed to process [{}] records, [{}] need manual reconciliation",
            report.failure_count(),
            report.drift_count()
        )
        .into());
    }

    Ok(report.summary())
}

#[cfg(test)]
mod tests {
    use crate::batch_handler::BatchSummary;
    use crate::engine::ReconciliationEngine;
    use crate::{ReconcileLambdaEvent, reconcile_fn};
    use lambda_runtime::{Context, LambdaEvent};
    use model::IdentityRecord;
    use state::IdentityStore;
    use state_in_memory::InMemoryIdentityStore;
    use std::sync::Arc;
    use test_utils::{
        MockConfigurationLoader, MockRemotePolicyService, s3_event_with_records, s3_record,
    };

    fn lambda_event(records: Vec<serde_json::Value>) -> ReconcileLambdaEvent {
        let mut context: Context = Context::default();
        context.request_id = "lambda-request-1".to_string();

        LambdaEvent::new(s3_event_with_records(records), context)
    }

    fn engine(store: InMemoryIdentityStore) -> ReconciliationEngine {
        ReconciliationEngine::new(
            Arc::new(store),
            Arc::new(MockConfigurationLoader::default()),
            Arc::new(MockRemotePolicyService::returning("pol-001")),
        )
    }

    #[tokio::test]
    async fn handler_reconciles_event_records() {
        let store: InMemoryIdentityStore = InMemoryIdentityStore::default();

        let summary: BatchSummary = reconcile_fn(
            &engine(store.clone()),
            lambda_event(vec![
                s3_record("orders.yaml", "ObjectCreated:Put", "2026-10-18T01:00:00.000Z"),
                s3_record("policies/", "ObjectCreated:Put", "2026-10-18T01:00:00.000Z"),
            ]),
        )
        .await
        .expect("Batch should succeed");

        assert_eq!(
            BatchSummary {
                processed: 1,
                skipped: 1,
                failed: 0,
            },
            summary
        );

        let record: IdentityRecord = store
            .find_by_key("orders.yaml")
            .await
            .expect("Lookup should succeed")
            .expect("Record should exist");
        assert_eq!("pol-001", record.remote_policy_id);
        assert_eq!("lambda-request-1", record.request_id);
        assert_eq!("2026-10-18T01:00:00.000Z", record.created_at);
    }

    #[tokio::test]
    async fn handler_fails_when_any_record_fails() {
        let result = reconcile_fn(
            &engine(InMemoryIdentityStore::default()),
            lambda_event(vec![
                s3_record("orders.yaml", "ObjectRemoved:Delete", "2026-10-18T01:00:00.000Z"),
                s3_record("backups.yaml", "ObjectCreated:Put", "2026-10-18T01:00:00.000Z"),
            ]),
        )
        .await;

        let err = result.expect_err("Batch should fail");
        assert!(err.to_string().contains("Failed to process [1] records"));
    }
}
