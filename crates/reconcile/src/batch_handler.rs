use crate::engine::{ReconcileOutcome, ReconciliationEngine};
use crate::error::ReconcileError;
use aws_lambda_events::s3::{S3Event, S3EventRecord};
use lambda_runtime::tracing;
use lambda_runtime::tracing::{Instrument, Span};
use model::ChangeNotification;
use serde::Serialize;
use std::collections::HashMap;

/// A notification which couldn't be reconciled, and why.
#[derive(Debug)]
pub struct NotificationFailure {
    pub notification: ChangeNotification,
    pub error: ReconcileError,
}

/// Per-notification results of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub failures: Vec<NotificationFailure>,
}

/// Counts returned to the invoker once a batch succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Failures that left a remote policy and its mapping out of step.
    pub fn drift_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|failure| failure.error.is_drift())
            .count()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            processed: self.processed,
            skipped: self.skipped,
            failed: self.failure_count(),
        }
    }
}

/// Normalise the records of an S3 event.
/// Records missing a bucket or key are dropped and counted.
pub fn notifications_from_event(
    event: &S3Event,
    correlation_id: &str,
) -> (Vec<ChangeNotification>, usize) {
    let mut dropped: usize = 0;

    let notifications: Vec<ChangeNotification> = event
        .records
        .iter()
        .filter_map(|record: &S3EventRecord| {
            let notification: Option<ChangeNotification> =
                ChangeNotification::from_s3_record(record, correlation_id);

            if notification.is_none() {
                tracing::warn!(
                    event_name = ?record.event_name,
                    "Ignoring record without a bucket or object key"
                );
                dropped += 1;
            }

            notification
        })
        .collect();

    (notifications, dropped)
}

/// Reconcile a batch of notifications.
///
/// Notifications for different objects run concurrently. Those for the same
/// object run one after another in arrival order, so a later delete can't
/// race an earlier update. A failure is recorded and never stops the batch.
pub async fn handle_batch(
    engine: &ReconciliationEngine,
    notifications: Vec<ChangeNotification>,
) -> BatchReport {
    tracing::info!("Handling batch of [{}] notifications", notifications.len());

    let mut report: BatchReport = BatchReport::default();

    // Group by object key, keeping first-seen order of keys
    let mut groups: Vec<Vec<ChangeNotification>> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for notification in notifications {
        if notification.is_directory() {
            tracing::info!(
                object_key = %notification.object_key,
                "Ignoring notification as it is not a file"
            );
            report.skipped += 1;
            continue;
        }

        let index: usize = *group_index
            .entry(notification.object_key.clone())
            .or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });

        groups[index].push(notification);
    }

    let tasks = groups.into_iter().map(|group: Vec<ChangeNotification>| async move {
        let mut results: Vec<(ChangeNotification, Result<ReconcileOutcome, ReconcileError>)> =
            Vec::with_capacity(group.len());

        for notification in group {
            let span: Span = tracing::span!(
                tracing::Level::INFO,
                "Reconcile",
                object_key = %notification.object_key,
                event_name = %notification.event_name,
                correlation_id = %notification.correlation_id
            );

            let result: Result<ReconcileOutcome, ReconcileError> =
                engine.reconcile(&notification).instrument(span).await;

            results.push((notification, result));
        }

        results
    });

    // Process all objects concurrently
    let results = futures::future::join_all(tasks).await;

    for (notification, result) in results.into_iter().flatten() {
        report.processed += 1;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    object_key = %notification.object_key,
                    ?outcome,
                    "Successfully processed notification"
                );
            }
            Err(error) => {
                tracing::error!(
                    object_key = %notification.object_key,
                    event_name = %notification.event_name,
                    failure = error.kind(),
                    reconciliation_drift = error.is_drift(),
                    "Failed to process notification: {error}"
                );

                report.failures.push(NotificationFailure {
                    notification,
                    error,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use crate::batch_handler::{BatchReport, handle_batch, notifications_from_event};
    use crate::engine::ReconciliationEngine;
    use crate::error::ReconcileError;
    use async_trait::async_trait;
    use model::request::PolicyRequest;
    use model::{ChangeNotification, IdentityRecord};
    use service::{RemotePolicyService, ServiceError};
    use state::{IdentityStore, StoreOperation};
    use state_in_memory::InMemoryIdentityStore;
    use std::sync::{Arc, Mutex};
    use test_utils::{
        MockConfigurationLoader, MockRemotePolicyService, RecordingIdentityStore, RemoteCall,
        identity_record, notification, s3_event_with_records, s3_record,
    };

    fn engine(
        store: InMemoryIdentityStore,
        remote: Arc<MockRemotePolicyService>,
    ) -> ReconciliationEngine {
        ReconciliationEngine::new(
            Arc::new(store),
            Arc::new(MockConfigurationLoader::default()),
            remote,
        )
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_notifications() {
        let store: InMemoryIdentityStore = InMemoryIdentityStore::default();
        let remote: Arc<MockRemotePolicyService> = Arc::new(MockRemotePolicyService::default());

        let report: BatchReport = handle_batch(
            &engine(store.clone(), remote.clone()),
            vec![
                // No mapping exists, so this fails
                notification("stale.yaml", "ObjectRemoved:Delete", "t0"),
                notification("orders.yaml", "ObjectCreated:Put", "t0"),
            ],
        )
        .await;

        assert_eq!(2, report.processed);
        assert_eq!(1, report.failure_count());
        assert_eq!(0, report.drift_count());
        assert_eq!("stale.yaml", report.failures[0].notification.object_key);
        assert!(matches!(
            report.failures[0].error,
            ReconcileError::MissingMapping { .. }
        ));

        let created: Option<IdentityRecord> = store
            .find_by_key("orders.yaml")
            .await
            .expect("Lookup should succeed");
        assert!(created.is_some());
    }

    #[tokio::test]
    async fn directory_notifications_are_skipped() {
        let remote: Arc<MockRemotePolicyService> = Arc::new(MockRemotePolicyService::default());

        let report: BatchReport = handle_batch(
            &engine(InMemoryIdentityStore::default(), remote.clone()),
            vec![notification("policies/", "ObjectCreated:Put", "t0")],
        )
        .await;

        assert_eq!(0, report.processed);
        assert_eq!(1, report.skipped);
        assert!(remote.calls().is_empty());
    }

    /// Remote which yields to the executor part way through updating `slow_policy_id`,
    /// recording when each call starts and finishes.
    struct YieldingRemote {
        slow_policy_id: &'static str,
        events: Mutex<Vec<String>>,
    }

    impl YieldingRemote {
        fn new(slow_policy_id: &'static str) -> Self {
            YieldingRemote {
                slow_policy_id,
                events: Mutex::new(Vec::new()),
            }
        }

        fn log(&self, event: String) {
            self.events.lock().expect("Lock should not be poisoned").push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().expect("Lock should not be poisoned").clone()
        }

        fn position(&self, event: &str) -> usize {
            self.events()
                .iter()
                .position(|logged| logged == event)
                .unwrap_or_else(|| panic!("Expected [{event}] to be recorded"))
        }
    }

    #[async_trait]
    impl RemotePolicyService for YieldingRemote {
        fn name(&self) -> &'static str {
            "YieldingRemote"
        }

        async fn create(&self, _request: &PolicyRequest) -> Result<String, ServiceError> {
            Ok("pol-new".to_string())
        }

        async fn update(
            &self,
            _request: &PolicyRequest,
            policy_id: &str,
        ) -> Result<(), ServiceError> {
            self.log(format!("start update {policy_id}"));

            if policy_id == self.slow_policy_id {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                }
            }

            self.log(format!("end update {policy_id}"));
            Ok(())
        }

        async fn delete(&self, policy_id: &str) -> Result<(), ServiceError> {
            self.log(format!("delete {policy_id}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn same_key_notifications_run_in_order() {
        let store: InMemoryIdentityStore = InMemoryIdentityStore::with_records([
            identity_record("orders.yaml", "pol-orders", "t0"),
            identity_record("backups.yaml", "pol-backups", "t0"),
        ]);
        let remote: Arc<YieldingRemote> = Arc::new(YieldingRemote::new("pol-orders"));
        let engine: ReconciliationEngine = ReconciliationEngine::new(
            Arc::new(store.clone()),
            Arc::new(MockConfigurationLoader::default()),
            remote.clone(),
        );

        let report: BatchReport = handle_batch(
            &engine,
            vec![
                notification("orders.yaml", "ObjectCreated:Put", "t1"),
                notification("backups.yaml", "ObjectCreated:Put", "t1"),
                notification("orders.yaml", "ObjectRemoved:Delete", "t2"),
            ],
        )
        .await;

        assert_eq!(3, report.processed);
        assert_eq!(0, report.failure_count());

        // The delete waits for the update of the same key to finish
        assert!(remote.position("end update pol-orders") < remote.position("delete pol-orders"));
        // Other keys carry on while it is suspended
        assert!(
            remote.position("end update pol-backups") < remote.position("end update pol-orders")
        );

        assert!(
            store
                .find_by_key("orders.yaml")
                .await
                .expect("Lookup should succeed")
                .is_none()
        );
        assert_eq!(
            Some("pol-backups".to_string()),
            store
                .find_by_key("backups.yaml")
                .await
                .expect("Lookup should succeed")
                .map(|record| record.remote_policy_id)
        );
    }

    #[tokio::test]
    async fn drift_is_counted_separately() {
        let store: RecordingIdentityStore =
            RecordingIdentityStore::new(InMemoryIdentityStore::with_records([identity_record(
                "orders.yaml",
                "pol-001",
                "t0",
            )]))
            .failing_on(StoreOperation::Delete);
        let remote: Arc<MockRemotePolicyService> = Arc::new(MockRemotePolicyService::default());
        let engine: ReconciliationEngine = ReconciliationEngine::new(
            Arc::new(store),
            Arc::new(MockConfigurationLoader::default()),
            remote.clone(),
        );

        let report: BatchReport = handle_batch(
            &engine,
            vec![
                notification("orders.yaml", "ObjectRemoved:Delete", "t1"),
                notification("stale.yaml", "ObjectRemoved:Delete", "t1"),
            ],
        )
        .await;

        assert_eq!(2, report.failure_count());
        assert_eq!(1, report.drift_count());
        assert_eq!(vec![RemoteCall::Delete("pol-001".to_string())], remote.calls());
        assert_eq!(2, report.summary().failed);
    }

    #[test]
    fn event_records_become_notifications() {
        let event = s3_event_with_records(vec![
            s3_record("orders.yaml", "ObjectCreated:Put", "2026-10-18T01:02:03.000Z"),
            s3_record("policies/", "ObjectCreated:Put", "2026-10-18T01:02:04.000Z"),
        ]);

        let (notifications, dropped): (Vec<ChangeNotification>, usize) =
            notifications_from_event(&event, "lambda-request-1");

        assert_eq!(0, dropped);
        assert_eq!(2, notifications.len());
        assert_eq!("orders.yaml", notifications[0].object_key);
        assert_eq!("policies", notifications[0].bucket);
        assert_eq!("ObjectCreated:Put", notifications[0].event_name);
        assert_eq!("2026-10-18T01:02:03.000Z", notifications[0].event_time);
        assert_eq!("lambda-request-1", notifications[0].correlation_id);
        assert!(notifications[1].is_directory());
    }

    #[test]
    fn encoded_keys_are_kept_as_delivered() {
        let event = s3_event_with_records(vec![s3_record(
            "policies/nightly+backups%281%29.yaml",
            "ObjectCreated:Put",
            "2026-10-18T01:02:03.000Z",
        )]);

        let (notifications, _): (Vec<ChangeNotification>, usize) =
            notifications_from_event(&event, "lambda-request-1");

        assert_eq!(
            "policies/nightly+backups%281%29.yaml",
            notifications[0].object_key
        );
    }
}
