use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for the crate.
///
/// Variants follow the failure taxonomy of the orchestration layer:
/// configuration problems are fatal at construction time, validation
/// problems are raised before any engine call, execution problems come out
/// of the subprocess layer, storage problems out of the filesystem and the
/// volume store, and numeric problems out of the statistical
/// post-processor.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Execution error: {message}")]
    Execution {
        message: String,
        command: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Numeric error: {message}")]
    Numeric { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            command: None,
            source: None,
        }
    }

    pub fn execution_for(message: impl Into<String>, command: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            command: Some(command.into()),
            source: None,
        }
    }

    pub fn storage(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn storage_io(message: impl Into<String>, path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            path: Some(path.to_path_buf()),
            source: Some(Box::new(err)),
        }
    }

    pub fn numeric(message: impl Into<String>) -> Self {
        Self::Numeric {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
