//! Local directory session
//!
//! Maps the remote namespace onto a directory on this machine, so `/a/b`
//! becomes `<root>/a/b`. Useful for tests and for syncing onto a mounted
//! share without a server in between.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use ftpsync_core::{ConnectError, Connector, RemoteEndpoint, RemoteError, Result, Session};
use tracing::debug;

/// Opens [`LocalSession`]s rooted at a fixed directory
#[derive(Debug, Clone)]
pub struct LocalConnector {
    root: PathBuf,
}

impl LocalConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Connector for LocalConnector {
    type Session = LocalSession;

    fn open(&self, endpoint: &RemoteEndpoint) -> Result<LocalSession> {
        if !self.root.is_dir() {
            return Err(ConnectError::Dial {
                address: endpoint.address.clone(),
                reason: format!("{} is not a directory", self.root.display()),
            }
            .into());
        }
        debug!(
            "Local session for {} at {}",
            endpoint.username,
            self.root.display()
        );
        Ok(LocalSession::new(&self.root))
    }
}

/// Session whose remote tree is a local directory
#[derive(Debug)]
pub struct LocalSession {
    root: PathBuf,
}

impl LocalSession {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path for a remote path; `..` is rejected
    fn resolve(&self, remote: &str) -> Result<PathBuf, RemoteError> {
        let mut path = self.root.clone();
        for component in Path::new(remote.trim_start_matches('/')).components() {
            match component {
                Component::Normal(name) => path.push(name),
                Component::CurDir => {}
                _ => {
                    return Err(RemoteError::Other(format!(
                        "{remote}: path escapes the session root"
                    )));
                }
            }
        }
        Ok(path)
    }

    fn regular_file(&self, remote: &str) -> Result<PathBuf, RemoteError> {
        let path = self.resolve(remote)?;
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(RemoteError::Other(format!("{remote}: not a regular file")));
        }
        Ok(path)
    }
}

impl Session for LocalSession {
    fn make_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        fs::create_dir(self.resolve(path)?)?;
        Ok(())
    }

    fn file_size(&mut self, path: &str) -> Result<u64, RemoteError> {
        let path = self.regular_file(path)?;
        Ok(fs::metadata(path)?.len())
    }

    fn store(&mut self, path: &str, data: &mut dyn Read) -> Result<(), RemoteError> {
        let mut file = File::create(self.resolve(path)?)?;
        let written = io::copy(data, &mut file)?;
        file.sync_all()?;
        debug!("Stored {path} ({written} bytes)");
        Ok(())
    }

    fn retrieve(&mut self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError> {
        let file = File::open(self.regular_file(path)?)?;
        Ok(Box::new(file))
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_session_make_dir() {
        let dir = TempDir::new().unwrap();
        let mut session = LocalSession::new(dir.path());

        session.make_dir("/a").unwrap();
        assert!(dir.path().join("a").is_dir());
        assert!(matches!(
            session.make_dir("/a"),
            Err(RemoteError::AlreadyExists)
        ));
        assert!(matches!(
            session.make_dir("/missing/child"),
            Err(RemoteError::NotFound)
        ));
    }

    #[test]
    fn test_local_session_store_size_retrieve() {
        let dir = TempDir::new().unwrap();
        let mut session = LocalSession::new(dir.path());

        session.store("/new.txt", &mut &b"content"[..]).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("new.txt")).unwrap(),
            "content"
        );
        assert_eq!(session.file_size("/new.txt").unwrap(), 7);

        let mut out = Vec::new();
        session
            .retrieve("/new.txt")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"content");
    }

    #[test]
    fn test_local_session_not_found() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut session = LocalSession::new(dir.path());

        assert!(matches!(
            session.file_size("/nope"),
            Err(RemoteError::NotFound)
        ));
        assert!(matches!(
            session.retrieve("/nope").err(),
            Some(RemoteError::NotFound)
        ));
        assert!(matches!(
            session.file_size("/sub"),
            Err(RemoteError::Other(_))
        ));
    }

    #[test]
    fn test_local_session_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let mut session = LocalSession::new(dir.path());
        assert!(matches!(
            session.make_dir("/../outside"),
            Err(RemoteError::Other(_))
        ));
    }

    #[test]
    fn test_connector_requires_root() {
        let dir = TempDir::new().unwrap();
        let endpoint = RemoteEndpoint::new("local", "user", "pw", false).unwrap();

        assert!(LocalConnector::new(dir.path()).open(&endpoint).is_ok());
        assert!(
            LocalConnector::new(dir.path().join("missing"))
                .open(&endpoint)
                .is_err()
        );
    }
}
