use crate::dispatcher::Strategy;
use crate::error::ReconcileError;
use lambda_runtime::tracing;
use model::{ChangeNotification, IdentityRecord};
use service::{ConfigurationLoader, RemotePolicyService};
use state::IdentityStore;
use std::sync::Arc;

/// Successful result of reconciling one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created { policy_id: String },
    Updated { policy_id: String },
    Deleted { policy_id: String },
}

/// Keeps remote lifecycle policies and their identity mappings in step with
/// changes to configuration objects.
///
/// Each call to `reconcile` is independent: a failure is returned to the
/// caller and leaves nothing behind which would affect other notifications.
#[derive(Clone)]
pub struct ReconciliationEngine {
    pub(crate) store: Arc<dyn IdentityStore>,
    pub(crate) loader: Arc<dyn ConfigurationLoader>,
    pub(crate) remote: Arc<dyn RemotePolicyService>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        loader: Arc<dyn ConfigurationLoader>,
        remote: Arc<dyn RemotePolicyService>,
    ) -> Self {
        ReconciliationEngine {
            store,
            loader,
            remote,
        }
    }

    pub async fn reconcile(
        &self,
        notification: &ChangeNotification,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let existing: Option<IdentityRecord> =
            self.store.find_by_key(&notification.object_key).await?;

        let strategy: Strategy = Strategy::new(&notification.event_name, existing);

        tracing::debug!(
            action = ?strategy.action(),
            service = self.remote.name(),
            "Dispatching notification"
        );

        match strategy {
            Strategy::Upsert { existing: None } => self.create_policy(notification).await,
            Strategy::Upsert {
                existing: Some(record),
            } => self.update_policy(notification, record).await,
            Strategy::Delete {
                existing: Some(record),
            } => self.delete_policy(record).await,
            Strategy::Delete { existing: None } => Err(ReconcileError::MissingMapping {
                object_key: notification.object_key.clone(),
            }),
        }
    }
}
