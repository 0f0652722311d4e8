use service::{ConfigLoadError, ServiceError};
use state::StoreError;
use std::fmt::{Display, Formatter};

/// A remote mutation which has already taken effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMutation {
    Created,
    Updated,
    Deleted,
}

impl Display for RemoteMutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("{:?}", self).to_lowercase().as_str())
    }
}

/// Failure reconciling a single notification.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),
    #[error("remote policy service failed: {0}")]
    RemoteService(#[from] ServiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    // The remote side changed but the mapping doesn't reflect it.
    // Needs manual repair, retrying the notification won't fix it.
    #[error(
        "reconciliation drift for [{object_key}]: policy {remote_policy_id} was {mutation} but the identity mapping was not written: {source}"
    )]
    Drift {
        object_key: String,
        remote_policy_id: String,
        mutation: RemoteMutation,
        source: StoreError,
    },
    #[error("no identity mapping for [{object_key}], cannot delete its policy")]
    MissingMapping { object_key: String },
}

impl ReconcileError {
    pub fn is_drift(&self) -> bool {
        matches!(self, ReconcileError::Drift { .. })
    }

    /// Short stable name for the failure class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::ConfigLoad(_) => "config_load",
            ReconcileError::RemoteService(_) => "remote_service",
            ReconcileError::Store(_) => "store",
            ReconcileError::Drift { .. } => "reconciliation_drift",
            ReconcileError::MissingMapping { .. } => "missing_mapping",
        }
    }
}
