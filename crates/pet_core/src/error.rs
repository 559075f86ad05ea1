use thiserror::Error;

/// Failures raised by the collaborators around the task store.
///
/// None of these are fatal: the in-memory state stays authoritative and the
/// host logs the error and carries on.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("persistence failure for key `{key}`: {message}")]
    Persistence { key: String, message: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("reminder scheduling failed: {0}")]
    Scheduler(String),

    #[error("reminder permission was not granted")]
    PermissionDenied,
}

impl CoreError {
    pub fn persistence(key: impl Into<String>, message: impl ToString) -> Self {
        CoreError::Persistence {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
