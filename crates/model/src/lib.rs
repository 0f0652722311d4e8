use aws_lambda_events::s3::S3EventRecord;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

pub mod env;
pub mod policy;
pub mod request;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Key convention marking an S3 "directory" placeholder object.
const DIRECTORY_SUFFIX: char = '/';

/// Durable mapping from a configuration object to the remote policy created from it.
///
/// Field names on the wire match the attributes of the identity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    #[serde(rename = "s3objectkey")]
    pub object_key: String,
    #[serde(rename = "policyid")]
    pub remote_policy_id: String,
    #[serde(rename = "requestid")]
    pub request_id: String,
    #[serde(rename = "createdat")]
    pub created_at: String,
    #[serde(rename = "updatedat")]
    pub updated_at: String,
}

impl IdentityRecord {
    /// A freshly created mapping, where both timestamps are the triggering event time.
    pub fn new(
        object_key: impl Into<String>,
        remote_policy_id: impl Into<String>,
        request_id: impl Into<String>,
        event_time: impl Into<String>,
    ) -> Self {
        let event_time: String = event_time.into();

        IdentityRecord {
            object_key: object_key.into(),
            remote_policy_id: remote_policy_id.into(),
            request_id: request_id.into(),
            created_at: event_time.clone(),
            updated_at: event_time,
        }
    }

    /// Copy of this record touched by a later request.
    /// The policy id and creation time are carried over untouched.
    pub fn touched(&self, request_id: impl Into<String>, event_time: impl Into<String>) -> Self {
        IdentityRecord {
            request_id: request_id.into(),
            updated_at: event_time.into(),
            ..self.clone()
        }
    }
}

/// A change to a configuration object, normalised from the triggering event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub object_key: String,
    pub bucket: String,
    // Raw event name such as `ObjectCreated:Put` or `ObjectRemoved:Delete`
    pub event_name: String,
    pub event_time: String,
    // Request id of the invocation which received the event
    pub correlation_id: String,
}

impl ChangeNotification {
    /// Normalise an S3 event record.
    /// Returns `None` when the record doesn't name both a bucket and an object.
    pub fn from_s3_record(record: &S3EventRecord, correlation_id: &str) -> Option<Self> {
        // Kept as delivered, S3 URL-encodes it in event payloads
        let object_key: String = record.s3.object.key.clone()?;
        let bucket: String = record.s3.bucket.name.clone()?;

        Some(ChangeNotification {
            object_key,
            bucket,
            event_name: record.event_name.clone().unwrap_or_default(),
            event_time: record
                .event_time
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn is_directory(&self) -> bool {
        self.object_key.ends_with(DIRECTORY_SUFFIX)
    }
}
