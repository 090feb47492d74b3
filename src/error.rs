// src/error.rs

//! Error types for the product registry
//!
//! One enum covers the whole library. The CLI turns each variant into a
//! user-facing hint and a POSIX exit status; the library never exits.

use crate::marshal::MarshalError;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Initialization
    #[error("Registry has not been initialized")]
    NotInitialized,

    // Access
    #[error("Cannot access file: {0}")]
    NoFileAccess(String),

    #[error("Cannot access the product registry: {0}")]
    NoRegAccess(String),

    #[error("Insufficient privilege to modify the product registry")]
    CannotWrite,

    // External tools
    #[error("The unzip utility is not installed")]
    UnzipNotInstalled,

    #[error("unzip failed: {0}")]
    UnzipError(String),

    #[error("Not a valid registry archive: {0}")]
    BadFile(String),

    #[error("Cannot create temporary directory: {0}")]
    CannotCreateTmp(String),

    // Datastore
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Registry file is damaged: {0}")]
    BadRegistryFile(String),

    // Query
    #[error("Query matches more than one component: {0}")]
    AmbiguousResults(String),

    #[error("No such component: {0}")]
    NoSuchComponent(String),

    // Mutation
    #[error("Unregistering {0} would break components that require it")]
    UnregisterWouldBreak(String),

    #[error("Component is not registered: {0}")]
    UnregNotRegistered(String),

    #[error("Component {0} has no English display name")]
    MissingDisplayName(String),

    #[error("Parent edge would make {0} its own ancestor")]
    CycleDetected(String),

    #[error("Component {0} cannot reference itself")]
    SelfReference(String),

    // Memory
    #[error("Out of memory")]
    OutOfMemory,

    // General
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timed out: {0}")]
    TimeoutError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::OutOfMemory => Error::OutOfMemory,
            _ => Error::IoError(err.to_string()),
        }
    }
}

impl Error {
    /// Hint printed by the CLI after the error message
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::CannotWrite => Some(
                "Try again as root, or run under an RBAC role that grants the prodreg command.",
            ),
            Error::NoRegAccess(_) => {
                Some("The registry is not writable by this user; conversion was not attempted.")
            }
            Error::NoFileAccess(_) => Some("Check the permissions on the old registry archive."),
            Error::FileNotFound(_) => Some("The old registry archive could not be found."),
            Error::UnzipNotInstalled => {
                Some("Install the unzip utility to convert the old registry archive.")
            }
            Error::UnzipError(_) | Error::BadFile(_) => {
                Some("The old registry archive is not a readable zip file.")
            }
            Error::CannotCreateTmp(_) => {
                Some("A temporary directory for conversion could not be created.")
            }
            Error::UnregisterWouldBreak(_) => {
                Some("Other components require this one; use -f to unregister anyway.")
            }
            _ => None,
        }
    }
}
