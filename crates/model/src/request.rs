use crate::policy::{Schedule, Tag};

/// Payload for creating or updating a remote lifecycle policy.
/// Carries a single schedule, as only one is honoured per definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRequest {
    pub description: Option<String>,
    pub execution_role_arn: String,
    pub state: String,
    pub resource_types: Vec<String>,
    pub target_tags: Vec<Tag>,
    pub schedule: Schedule,
}
