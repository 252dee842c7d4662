//! Azure declaration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Build context directory not found: {0}")]
    BuildContextNotFound(PathBuf),

    #[error("Build context is not a directory: {0}")]
    InvalidBuildContext(PathBuf),

    #[error("Duplicate app setting: {0}")]
    DuplicateAppSetting(String),

    #[error("App setting name must not be empty")]
    EmptyAppSettingName,

    #[error("Registry credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] labgen_infra_cloud::CloudError),
}

impl AzureError {
    /// User-facing message with a hint on how to fix the problem
    pub fn user_message(&self) -> String {
        match self {
            AzureError::BuildContextNotFound(path) => format!(
                "Build context not found: {}\n\
                 \n\
                 Check the appPath setting of the stack (default: ./..).",
                path.display()
            ),
            AzureError::CredentialsUnavailable(reason) => format!(
                "Registry credentials unavailable: {}\n\
                 \n\
                 The registry must exist and have its admin user enabled.",
                reason
            ),
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
