use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DropletError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Sensor error: {0}")]
    SensorError(String),
    #[error("Camera error: {0}")]
    CameraError(String),
    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),
    #[error("Serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Stable, machine-readable classification of a [`DropletError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    ValidationError,
    IoError,
    DatabaseError,
    SensorError,
    CameraError,
    ConfigError,
    ArchiveError,
    SerializationError,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::IoError => "io_error",
            ErrorKind::DatabaseError => "database_error",
            ErrorKind::SensorError => "sensor_error",
            ErrorKind::CameraError => "camera_error",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::ArchiveError => "archive_error",
            ErrorKind::SerializationError => "serialization_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DropletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DropletError::RusqliteError(_) | DropletError::DatabaseInitializationError(_) => {
                ErrorKind::DatabaseError
            }
            DropletError::IoError(_) => ErrorKind::IoError,
            DropletError::ConfigError(_) => ErrorKind::ConfigError,
            DropletError::ValidationError(_) => ErrorKind::ValidationError,
            DropletError::NotFound(_) => ErrorKind::NotFound,
            DropletError::Conflict(_) => ErrorKind::Conflict,
            DropletError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            DropletError::SensorError(_) => ErrorKind::SensorError,
            DropletError::CameraError(_) => ErrorKind::CameraError,
            DropletError::ArchiveError(_) => ErrorKind::ArchiveError,
            DropletError::JsonError(_) => ErrorKind::SerializationError,
            DropletError::InternalError(_) => ErrorKind::Internal,
        }
    }
}
