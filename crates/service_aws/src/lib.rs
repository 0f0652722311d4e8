//! AWS implementations of the configuration loader and remote policy service.

mod dlm;
mod s3_loader;

pub use dlm::DlmPolicyService;
pub use s3_loader::S3PolicyLoader;
