use model::IdentityRecord;

/// Prefix shared by every "object removed" event, including delete markers.
const REMOVED_EVENT_PREFIX: &str = "ObjectRemoved";
/// Prefix added by some event sources, e.g. `s3:ObjectRemoved:Delete`.
const EVENT_SOURCE_PREFIX: &str = "s3:";

/// What a notification asks for.
///
/// Object stores don't tell a new object apart from an overwritten one, so
/// both are an `Upsert`. Creation is decided later from the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upsert,
    Delete,
}

pub fn classify(event_name: &str) -> Action {
    let event_name: &str = event_name
        .strip_prefix(EVENT_SOURCE_PREFIX)
        .unwrap_or(event_name);

    if event_name.starts_with(REMOVED_EVENT_PREFIX) {
        Action::Delete
    } else {
        Action::Upsert
    }
}

/// The action for a notification, paired with the mapping known before it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Upsert { existing: Option<IdentityRecord> },
    Delete { existing: Option<IdentityRecord> },
}

impl Strategy {
    pub fn new(event_name: &str, existing: Option<IdentityRecord>) -> Self {
        match classify(event_name) {
            Action::Upsert => Strategy::Upsert { existing },
            Action::Delete => Strategy::Delete { existing },
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Strategy::Upsert { .. } => Action::Upsert,
            Strategy::Delete { .. } => Action::Delete,
        }
    }
}
