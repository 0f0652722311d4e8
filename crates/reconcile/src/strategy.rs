use crate::engine::{ReconcileOutcome, ReconciliationEngine};
use crate::error::{ReconcileError, RemoteMutation};
use lambda_runtime::tracing;
use model::policy::{PolicyDefinition, Schedule};
use model::request::PolicyRequest;
use model::{ChangeNotification, IdentityRecord};
use service::ConfigLoadError;
use state::StoreError;

/// Log target for failures which need out-of-band repair.
pub const DRIFT_TARGET: &str = "reconciliation_drift";

/// Build the remote request for a definition.
///
/// Only the first schedule is honoured. Any further schedules are logged and
/// dropped, and a definition without schedules is rejected.
pub fn build_policy_request(
    object_key: &str,
    definition: PolicyDefinition,
) -> Result<PolicyRequest, ConfigLoadError> {
    let mut schedules = definition.policy_details.schedules.into_iter();

    let Some(schedule) = schedules.next() else {
        return Err(ConfigLoadError::Invalid {
            object_key: object_key.to_string(),
            reason: "no schedules defined".to_string(),
        });
    };

    let ignored: Vec<String> = schedules.map(|schedule: Schedule| schedule.name).collect();
    if !ignored.is_empty() {
        tracing::warn!(
            object_key,
            applied = %schedule.name,
            ignored = ?ignored,
            "Only the first schedule is applied"
        );
    }

    Ok(PolicyRequest {
        description: definition.description,
        execution_role_arn: definition.execution_role_arn,
        state: definition.state,
        resource_types: vec![definition.policy_details.resource_types],
        target_tags: definition.policy_details.target_tags,
        schedule,
    })
}

impl ReconciliationEngine {
    /// No mapping exists yet, so create the remote policy and record it.
    pub(crate) async fn create_policy(
        &self,
        notification: &ChangeNotification,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let request: PolicyRequest = self.load_request(notification).await?;

        let policy_id: String = self.remote.create(&request).await?;

        let record: IdentityRecord = IdentityRecord::new(
            &notification.object_key,
            &policy_id,
            &notification.correlation_id,
            &notification.event_time,
        );

        self.store.create(&record).await.map_err(|err| {
            drift(&record, RemoteMutation::Created, err)
        })?;

        Ok(ReconcileOutcome::Created { policy_id })
    }

    /// Update the mapped remote policy, then touch the mapping.
    pub(crate) async fn update_policy(
        &self,
        notification: &ChangeNotification,
        existing: IdentityRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let request: PolicyRequest = self.load_request(notification).await?;

        self.remote
            .update(&request, &existing.remote_policy_id)
            .await?;

        let record: IdentityRecord =
            existing.touched(&notification.correlation_id, &notification.event_time);

        self.store.update(&record).await.map_err(|err| {
            drift(&record, RemoteMutation::Updated, err)
        })?;

        Ok(ReconcileOutcome::Updated {
            policy_id: record.remote_policy_id,
        })
    }

    /// Delete the mapped remote policy, then its mapping.
    /// A failed remote delete leaves the mapping so a later notification can retry.
    pub(crate) async fn delete_policy(
        &self,
        existing: IdentityRecord,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.remote.delete(&existing.remote_policy_id).await?;

        self.store.delete(&existing).await.map_err(|err| {
            drift(&existing, RemoteMutation::Deleted, err)
        })?;

        Ok(ReconcileOutcome::Deleted {
            policy_id: existing.remote_policy_id,
        })
    }

    async fn load_request(
        &self,
        notification: &ChangeNotification,
    ) -> Result<PolicyRequest, ReconcileError> {
        let definition: PolicyDefinition = self
            .loader
            .load(&notification.bucket, &notification.object_key)
            .await?;

        Ok(build_policy_request(&notification.object_key, definition)?)
    }
}

fn drift(record: &IdentityRecord, mutation: RemoteMutation, source: StoreError) -> ReconcileError {
    tracing::error!(
        target: DRIFT_TARGET,
        reconciliation_drift = true,
        object_key = %record.object_key,
        remote_policy_id = %record.remote_policy_id,
        %mutation,
        error = %source,
        "Remote policy changed but the identity mapping was not written"
    );

    ReconcileError::Drift {
        object_key: record.object_key.clone(),
        remote_policy_id: record.remote_policy_id.clone(),
        mutation,
        source,
    }
}

#[cfg(test)]
mod tests {
    use crate::strategy::build_policy_request;
    use model::policy::{PolicyDefinition, Schedule};
    use model::request::PolicyRequest;
    use service::ConfigLoadError;
    use test_utils::{sample_policy_definition, sample_policy_request};

    #[test]
    fn request_uses_definition_fields() {
        let request: PolicyRequest =
            build_policy_request("orders.yaml", sample_policy_definition())
                .expect("Request should build");

        assert_eq!(sample_policy_request(), request);
        assert_eq!(1, request.schedule.create_rule.interval);
        assert_eq!("HOURS", request.schedule.create_rule.interval_unit);
        assert_eq!(5, request.schedule.retain_rule.count);
        assert_eq!(vec!["VOLUME".to_string()], request.resource_types);
    }

    #[test]
    fn only_first_schedule_is_used() {
        let mut definition: PolicyDefinition = sample_policy_definition();
        let mut weekly: Schedule = definition.policy_details.schedules[0].clone();
        weekly.name = "Weekly".to_string();
        definition.policy_details.schedules.push(weekly);

        let request: PolicyRequest =
            build_policy_request("orders.yaml", definition).expect("Request should build");

        assert_eq!("Hourly", request.schedule.name);
    }

    #[test]
    fn definition_without_schedules_is_invalid() {
        let mut definition: PolicyDefinition = sample_policy_definition();
        definition.policy_details.schedules.clear();

        let err: ConfigLoadError =
            build_policy_request("orders.yaml", definition).expect_err("Request should fail");

        assert!(matches!(err, ConfigLoadError::Invalid { .. }));
    }
}
