use model::env::{IDENTITY_STORE_BACKEND, IDENTITY_TABLE_CONSISTENT_READ, IDENTITY_TABLE_NAME};
use state::StoreConfig;
use std::str::FromStr;

/// Which identity store implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    DynamoDb,
    InMemory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(StoreBackend::DynamoDb),
            "memory" | "in_memory" => Ok(StoreBackend::InMemory),
            _ => Err(ConfigError::InvalidValue {
                name: IDENTITY_STORE_BACKEND,
                value: value.to_string(),
            }),
        }
    }
}

/// Settings for a reconciler process, read once at start up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcilerConfig {
    pub store_backend: StoreBackend,
    pub store: StoreConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value [{value}] for {name}")]
    InvalidValue { name: &'static str, value: String },
}

impl ReconcilerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, using defaults for unset values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config: ReconcilerConfig = ReconcilerConfig::default();

        if let Some(backend) = lookup(IDENTITY_STORE_BACKEND) {
            config.store_backend = backend.parse()?;
        }

        if let Some(table_name) = lookup(IDENTITY_TABLE_NAME).filter(|name| !name.is_empty()) {
            config.store.table_name = table_name;
        }

        if let Some(consistent_read) = lookup(IDENTITY_TABLE_CONSISTENT_READ) {
            config.store.consistent_read =
                consistent_read
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        name: IDENTITY_TABLE_CONSISTENT_READ,
                        value: consistent_read.clone(),
                    })?;
        }

        Ok(config)
    }
}
