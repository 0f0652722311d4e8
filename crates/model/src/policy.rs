//! Lifecycle policy definitions as written in configuration objects.
//!
//! Keys follow the PascalCase naming of the lifecycle API so a definition
//! reads the same as the policy it produces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDefinition {
    #[serde(default)]
    pub description: Option<String>,
    pub execution_role_arn: String,
    pub state: String,
    pub policy_details: PolicyDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDetails {
    pub resource_types: String,
    #[serde(default)]
    pub target_tags: Vec<Tag>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Schedule {
    pub name: String,
    pub create_rule: CreateRule,
    pub retain_rule: RetainRule,
    #[serde(default, alias = "Tag")]
    pub tags_to_add: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRule {
    pub interval: i32,
    pub interval_unit: String,
    #[serde(default)]
    pub times: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RetainRule {
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use crate::policy::PolicyDefinition;

    const DEFINITION: &str = r#"
Description: Daily volume snapshots
ExecutionRoleArn: arn:aws:iam::123456789012:role/AWSDataLifecycleManagerDefaultRole
State: ENABLED
PolicyDetails:
  ResourceTypes: VOLUME
  TargetTags:
    - Key: backup
      Value: daily
  Schedules:
    - Name: Daily
      CreateRule:
        Interval: 24
        IntervalUnit: HOURS
        Times:
          - "03:00"
      RetainRule:
        Count: 7
      Tag:
        - Key: source
          Value: dlm
"#;

    #[test]
    fn parses_definition_with_legacy_tag_field() {
        let definition: PolicyDefinition =
            serde_yaml::from_str(DEFINITION).expect("Definition should parse");

        assert_eq!(
            Some("Daily volume snapshots".to_string()),
            definition.description
        );
        assert_eq!("VOLUME", definition.policy_details.resource_types);

        let schedule = &definition.policy_details.schedules[0];
        assert_eq!(24, schedule.create_rule.interval);
        assert_eq!(vec!["03:00".to_string()], schedule.create_rule.times);
        assert_eq!(7, schedule.retain_rule.count);
        assert_eq!("source", schedule.tags_to_add[0].key);
    }

    #[test]
    fn description_and_tags_are_optional() {
        let definition: PolicyDefinition = serde_yaml::from_str(
            r#"
ExecutionRoleArn: arn:role
State: DISABLED
PolicyDetails:
  ResourceTypes: INSTANCE
"#,
        )
        .expect("Minimal definition should parse");

        assert_eq!(None, definition.description);
        assert!(definition.policy_details.target_tags.is_empty());
        assert!(definition.policy_details.schedules.is_empty());
    }
}
