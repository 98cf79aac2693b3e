//! Session façade: the primitive remote operations the engine relies on
//!
//! Implementations live in `ftpsync-transport` (FTP, local directory) and
//! [`crate::memory`] (in-memory test double). Every call blocks until the
//! remote side answers.

use std::io::Read;

use tracing::{debug, warn};

use crate::endpoint::RemoteEndpoint;
use crate::error::{RemoteError, Result};

/// An authenticated connection to the remote store
pub trait Session {
    /// Create a single remote directory (parent must exist)
    ///
    /// # Errors
    /// [`RemoteError::AlreadyExists`] if it is already there
    fn make_dir(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Size in bytes of a remote file
    ///
    /// # Errors
    /// [`RemoteError::NotFound`] if there is no such file
    fn file_size(&mut self, path: &str) -> Result<u64, RemoteError>;

    /// Upload the full contents of `data`, replacing any existing file
    ///
    /// # Errors
    /// Returns an error if the transfer fails
    fn store(&mut self, path: &str, data: &mut dyn Read) -> Result<(), RemoteError>;

    /// Download a remote file as a byte stream
    ///
    /// # Errors
    /// [`RemoteError::NotFound`] if there is no such file
    fn retrieve(&mut self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError>;

    /// End the session
    ///
    /// # Errors
    /// Returns an error if the remote side rejects the goodbye
    fn close(&mut self) -> Result<(), RemoteError>;
}

/// Opens sessions for an endpoint (dial, optional TLS, login)
pub trait Connector {
    type Session: Session;

    /// # Errors
    /// Returns [`crate::Error::Connect`] if the session cannot be established
    fn open(&self, endpoint: &RemoteEndpoint) -> Result<Self::Session>;
}

/// Open a session, run `op` with it, and close it exactly once.
///
/// The session is closed on success and on failure. A failed close is logged
/// and never replaces the result of `op`.
///
/// # Errors
/// Returns the connect error, or whatever `op` returned
pub fn with_session<C, T, F>(connector: &C, endpoint: &RemoteEndpoint, op: F) -> Result<T>
where
    C: Connector + ?Sized,
    F: FnOnce(&mut C::Session) -> Result<T>,
{
    debug!("Opening session to {}", endpoint.address);
    let mut session = connector.open(endpoint)?;

    let result = op(&mut session);

    match session.close() {
        Ok(()) => debug!("Session to {} closed", endpoint.address),
        Err(e) => warn!("Error closing session to {}: {e}", endpoint.address),
    }

    result
}
