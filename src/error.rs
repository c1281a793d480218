// colord Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColordError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("File monitor error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    NotEnabled(String),

    #[error("{0}")]
    ProfileDoesNotExist(String),

    #[error("{0}")]
    ProfileAlreadyAdded(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NothingMatched(String),

    #[error("{0}")]
    Profiling(String),

    #[error("{0}")]
    InputInvalid(String),

    #[error("{0}")]
    AlreadyInstalled(String),

    #[error("{0}")]
    FailedToAuthenticate(String),

    #[error("{0}")]
    NotSupported(String),

    #[error("{0}")]
    AlreadyLocked(String),

    #[error("{0}")]
    NotLocked(String),

    #[error("{0}")]
    Internal(String),
}

impl ColordError {
    /// Stable error name reported to clients
    pub fn name(&self) -> &'static str {
        match self {
            ColordError::NotEnabled(_) => "NotEnabled",
            ColordError::ProfileDoesNotExist(_) => "ProfileDoesNotExist",
            ColordError::ProfileAlreadyAdded(_) => "ProfileAlreadyAdded",
            ColordError::AlreadyExists(_) => "AlreadyExists",
            ColordError::NotFound(_) => "NotFound",
            ColordError::NothingMatched(_) => "NothingMatched",
            ColordError::Profiling(_) => "Profiling",
            ColordError::InputInvalid(_) => "InputInvalid",
            ColordError::AlreadyInstalled(_) => "AlreadyInstalled",
            ColordError::FailedToAuthenticate(_) => "FailedToAuthenticate",
            ColordError::NotSupported(_) => "NotSupported",
            ColordError::AlreadyLocked(_) => "AlreadyLocked",
            ColordError::NotLocked(_) => "NotLocked",
            ColordError::Database(_)
            | ColordError::Io(_)
            | ColordError::Json(_)
            | ColordError::Config(_)
            | ColordError::Watch(_)
            | ColordError::Internal(_) => "Internal",
        }
    }
}

impl From<anyhow::Error> for ColordError {
    fn from(err: anyhow::Error) -> Self {
        ColordError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ColordError>;
