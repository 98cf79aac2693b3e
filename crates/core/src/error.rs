//! Error types shared by the sync engine and the session façades

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result category reported by a session façade for a single remote operation.
///
/// Façades classify their transport errors into these variants so the
/// engine never has to inspect reply codes or message text.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The target already exists (make-directory only)
    #[error("already exists")]
    AlreadyExists,
    /// The target does not exist
    #[error("not found")]
    NotFound,
    /// Any other failure, with the transport's description
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Wrap any displayable transport error as [`RemoteError::Other`]
    pub fn other(err: impl std::fmt::Display) -> Self {
        Self::Other(err.to_string())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<io::Error> for RemoteError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            _ => Self::Other(err.to_string()),
        }
    }
}

/// Failure to establish a session
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("error dialing {address:?}: {reason}")]
    Dial { address: String, reason: String },
    #[error("error securing channel to {address:?}: {reason}")]
    Secure { address: String, reason: String },
    #[error("error logging in as {username:?}: {reason}")]
    Login { username: String, reason: String },
}

/// Top-level error for check / pull / push operations
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration; raised before any remote contact
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("error creating remote directory {path}: {source}")]
    MakeDir {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("error uploading {} to {remote}: {source}", local.display())]
    Upload {
        local: PathBuf,
        remote: String,
        #[source]
        source: RemoteError,
    },

    #[error("error retrieving remote file {path}: {source}")]
    Retrieve {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("error accessing local path {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error walking local tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// The walk finished but some remote directories could not be created,
    /// so their subtrees were not synced
    #[error("{} remote director{} could not be created: {}", paths.len(), if paths.len() == 1 { "y" } else { "ies" }, paths.join(", "))]
    Incomplete { paths: Vec<String> },
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
