//! Versioning of a single tracked remote file

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, RemoteError, Result};
use crate::hash::{HashingReader, VersionToken, fingerprint, fingerprint_copy};
use crate::session::Session;

/// Current version of `remote`, or [`VersionToken::Empty`] if it does not exist
///
/// # Errors
/// Returns an error if the file exists but cannot be read
pub fn current_version<S: Session + ?Sized>(session: &mut S, remote: &str) -> Result<VersionToken> {
    let mut stream = match session.retrieve(remote) {
        Ok(stream) => stream,
        Err(RemoteError::NotFound) => {
            info!("{remote} does not exist yet");
            return Ok(VersionToken::empty());
        }
        Err(source) => {
            return Err(Error::Retrieve {
                path: remote.to_string(),
                source,
            });
        }
    };

    let token = fingerprint(&mut stream).map_err(|e| Error::Retrieve {
        path: remote.to_string(),
        source: e.into(),
    })?;
    debug!("{remote} is at {token}");
    Ok(token)
}

/// Download `remote` into `writer` and return its version.
///
/// Unlike [`current_version`], a missing file is an error here.
///
/// # Errors
/// Returns an error if the download or the write fails
pub fn fetch<S, W>(session: &mut S, remote: &str, writer: &mut W) -> Result<(VersionToken, u64)>
where
    S: Session + ?Sized,
    W: Write + ?Sized,
{
    let mut stream = session.retrieve(remote).map_err(|source| Error::Retrieve {
        path: remote.to_string(),
        source,
    })?;

    fingerprint_copy(&mut stream, writer).map_err(|e| Error::Retrieve {
        path: remote.to_string(),
        source: e.into(),
    })
}

/// Download `remote` to the local file `dest` (creating missing parent
/// directories).
///
/// The download goes to a temporary file next to `dest`, which only replaces
/// `dest` once the whole file has arrived. On failure `dest` is untouched.
///
/// # Errors
/// Returns an error if the download fails or `dest` cannot be written
pub fn fetch_to_file<S: Session + ?Sized>(
    session: &mut S,
    remote: &str,
    dest: &Path,
) -> Result<VersionToken> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::local_io(dir, e))?;

    let mut partial = NamedTempFile::new_in(dir).map_err(|e| Error::local_io(dir, e))?;
    let (token, len) = fetch(session, remote, &mut partial)?;
    partial
        .as_file()
        .sync_all()
        .map_err(|e| Error::local_io(partial.path(), e))?;
    partial
        .persist(dest)
        .map_err(|e| Error::local_io(dest, e.error))?;

    info!("Fetched {remote} ({len} bytes) to {}", dest.display());
    Ok(token)
}

/// Upload the local file `local` to `remote` and return the version of the
/// bytes that were actually sent
///
/// # Errors
/// Returns an error if `local` cannot be opened or the transfer fails
pub fn push_file<S: Session + ?Sized>(
    session: &mut S,
    local: &Path,
    remote: &str,
) -> Result<VersionToken> {
    let file = File::open(local).map_err(|e| Error::local_io(local, e))?;
    let mut reader = HashingReader::new(file);

    session
        .store(remote, &mut reader)
        .map_err(|source| Error::Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            source,
        })?;

    info!(
        "Uploaded {} ({} bytes) to {remote}",
        local.display(),
        reader.bytes_read()
    );
    Ok(reader.finish())
}
