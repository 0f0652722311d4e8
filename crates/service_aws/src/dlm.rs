use async_trait::async_trait;
use aws_sdk_dlm::operation::create_lifecycle_policy::CreateLifecyclePolicyOutput;
use aws_sdk_dlm::types::{
    CreateRule, IntervalUnitValues, PolicyDetails, ResourceTypeValues, RetainRule, Schedule,
    SettablePolicyStateValues, Tag,
};
use lambda_runtime::tracing;
use model::policy;
use model::request::PolicyRequest;
use service::{RemotePolicyService, ServiceError};

/// Lifecycle policies managed through Amazon Data Lifecycle Manager.
#[derive(Clone)]
pub struct DlmPolicyService {
    dlm_client: aws_sdk_dlm::Client,
}

impl DlmPolicyService {
    pub fn new(dlm_client: aws_sdk_dlm::Client) -> Self {
        DlmPolicyService { dlm_client }
    }
}

#[async_trait]
impl RemotePolicyService for DlmPolicyService {
    fn name(&self) -> &'static str {
        "DataLifecycleManager"
    }

    async fn create(&self, request: &PolicyRequest) -> Result<String, ServiceError> {
        let output: CreateLifecyclePolicyOutput = self
            .dlm_client
            .create_lifecycle_policy()
            .set_description(request.description.clone())
            .execution_role_arn(&request.execution_role_arn)
            .state(SettablePolicyStateValues::from(request.state.as_str()))
            .policy_details(policy_details(request)?)
            .send()
            .await
            .map_err(|err| ServiceError::Upstream(err.into()))?;

        let policy_id: String = output
            .policy_id()
            .map(str::to_string)
            .ok_or(ServiceError::MissingPolicyId)?;

        tracing::debug!(policy_id = %policy_id, "Created lifecycle policy");

        Ok(policy_id)
    }

    async fn update(&self, request: &PolicyRequest, policy_id: &str) -> Result<(), ServiceError> {
        self.dlm_client
            .update_lifecycle_policy()
            .policy_id(policy_id)
            .set_description(request.description.clone())
            .execution_role_arn(&request.execution_role_arn)
            .state(SettablePolicyStateValues::from(request.state.as_str()))
            .policy_details(policy_details(request)?)
            .send()
            .await
            .map_err(|err| ServiceError::Upstream(err.into()))?;

        tracing::debug!(policy_id, "Updated lifecycle policy");

        Ok(())
    }

    async fn delete(&self, policy_id: &str) -> Result<(), ServiceError> {
        self.dlm_client
            .delete_lifecycle_policy()
            .policy_id(policy_id)
            .send()
            .await
            .map_err(|err| ServiceError::Upstream(err.into()))?;

        tracing::debug!(policy_id, "Deleted lifecycle policy");

        Ok(())
    }
}

fn policy_details(request: &PolicyRequest) -> Result<PolicyDetails, ServiceError> {
    let schedule: &policy::Schedule = &request.schedule;

    let create_rule: CreateRule = CreateRule::builder()
        .interval(schedule.create_rule.interval)
        .interval_unit(IntervalUnitValues::from(
            schedule.create_rule.interval_unit.as_str(),
        ))
        .set_times(non_empty(schedule.create_rule.times.clone()))
        .build();

    let retain_rule: RetainRule = RetainRule::builder()
        .count(schedule.retain_rule.count)
        .build();

    let dlm_schedule: Schedule = Schedule::builder()
        .name(&schedule.name)
        .create_rule(create_rule)
        .retain_rule(retain_rule)
        .set_tags_to_add(non_empty(tags(&schedule.tags_to_add)?))
        .build();

    let resource_types: Vec<ResourceTypeValues> = request
        .resource_types
        .iter()
        .map(|resource_type| ResourceTypeValues::from(resource_type.as_str()))
        .collect();

    Ok(PolicyDetails::builder()
        .set_resource_types(Some(resource_types))
        .set_target_tags(non_empty(tags(&request.target_tags)?))
        .schedules(dlm_schedule)
        .build())
}

fn tags(tags: &[policy::Tag]) -> Result<Vec<Tag>, ServiceError> {
    tags.iter()
        .map(|tag| {
            Ok(Tag::builder()
                .key(&tag.key)
                .value(&tag.value)
                .build())
        })
        .collect()
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}
