/// Selects the identity store backend, either `dynamodb` or `memory`
pub const IDENTITY_STORE_BACKEND: &str = "IDENTITY_STORE_BACKEND";
/// Name of the DynamoDB table holding identity records
pub const IDENTITY_TABLE_NAME: &str = "IDENTITY_TABLE_NAME";
/// Whether identity lookups use strongly consistent reads
pub const IDENTITY_TABLE_CONSISTENT_READ: &str = "IDENTITY_TABLE_CONSISTENT_READ";
