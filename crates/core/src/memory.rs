//! In-memory session for tests
//!
//! Models a remote tree as sets of directories and files, records every
//! operation in call order, and can be told to fail specific paths.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::rc::Rc;

use crate::endpoint::RemoteEndpoint;
use crate::error::{ConnectError, RemoteError, Result};
use crate::session::{Connector, Session};

/// One recorded session call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    MakeDir(String),
    FileSize(String),
    Store(String),
    Retrieve(String),
    Close,
}

/// Everything the fake remote knows, shared by all sessions of a connector
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub ops: Vec<Op>,
    pub opened: usize,
    pub closed: usize,
    pub bytes_stored: u64,
    fail_make_dir: BTreeSet<String>,
    fail_store: BTreeSet<String>,
    fail_size: BTreeSet<String>,
    refuse_login: bool,
}

impl MemoryState {
    /// Paths passed to `store`, in order
    #[must_use]
    pub fn stored(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Store(path) => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Paths passed to `make_dir`, in order
    #[must_use]
    pub fn made_dirs(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::MakeDir(path) => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    fn parent_exists(&self, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some(("", _)) => true,
            Some((parent, _)) => self.dirs.contains(parent),
            None => false,
        }
    }
}

/// Connector handing out [`MemorySession`]s over one shared [`MemoryState`]
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a remote directory
    #[must_use]
    pub fn with_dir(self, path: &str) -> Self {
        self.state.borrow_mut().dirs.insert(path.to_string());
        self
    }

    /// Pre-create a remote file
    #[must_use]
    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.state
            .borrow_mut()
            .files
            .insert(path.to_string(), data.to_vec());
        self
    }

    /// Make `make_dir(path)` fail with a non-"exists" error
    #[must_use]
    pub fn fail_make_dir(self, path: &str) -> Self {
        self.state
            .borrow_mut()
            .fail_make_dir
            .insert(path.to_string());
        self
    }

    /// Make `store(path)` fail
    #[must_use]
    pub fn fail_store(self, path: &str) -> Self {
        self.state.borrow_mut().fail_store.insert(path.to_string());
        self
    }

    /// Make `file_size(path)` fail with a non-"not found" error
    #[must_use]
    pub fn fail_size(self, path: &str) -> Self {
        self.state.borrow_mut().fail_size.insert(path.to_string());
        self
    }

    /// Reject every login attempt
    #[must_use]
    pub fn refuse_login(self) -> Self {
        self.state.borrow_mut().refuse_login = true;
        self
    }

    /// Open a session without going through an endpoint
    #[must_use]
    pub fn session(&self) -> MemorySession {
        self.state.borrow_mut().opened += 1;
        MemorySession {
            state: Rc::clone(&self.state),
        }
    }

    /// Snapshot of the current remote state
    #[must_use]
    pub fn state(&self) -> MemoryState {
        self.state.borrow().clone()
    }

    /// Forget recorded operations, keeping the remote tree
    pub fn clear_ops(&self) {
        let mut state = self.state.borrow_mut();
        state.ops.clear();
        state.bytes_stored = 0;
    }
}

impl Connector for MemoryConnector {
    type Session = MemorySession;

    fn open(&self, endpoint: &RemoteEndpoint) -> Result<MemorySession> {
        if self.state.borrow().refuse_login {
            return Err(ConnectError::Login {
                username: endpoint.username.clone(),
                reason: "530 Login incorrect".to_string(),
            }
            .into());
        }
        Ok(self.session())
    }
}

/// Session over a [`MemoryConnector`]'s state
#[derive(Debug)]
pub struct MemorySession {
    state: Rc<RefCell<MemoryState>>,
}

impl Session for MemorySession {
    fn make_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::MakeDir(path.to_string()));

        if state.fail_make_dir.contains(path) {
            return Err(RemoteError::Other("550 Permission denied".to_string()));
        }
        if state.dirs.contains(path) || state.files.contains_key(path) {
            return Err(RemoteError::AlreadyExists);
        }
        if !state.parent_exists(path) {
            return Err(RemoteError::Other(format!("550 {path}: no such parent")));
        }
        state.dirs.insert(path.to_string());
        Ok(())
    }

    fn file_size(&mut self, path: &str) -> Result<u64, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::FileSize(path.to_string()));

        if state.fail_size.contains(path) {
            return Err(RemoteError::Other("500 SIZE not understood".to_string()));
        }
        state
            .files
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or(RemoteError::NotFound)
    }

    fn store(&mut self, path: &str, data: &mut dyn Read) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Store(path.to_string()));

        if state.fail_store.contains(path) {
            return Err(RemoteError::Other("451 Transfer aborted".to_string()));
        }
        if !state.parent_exists(path) {
            return Err(RemoteError::Other(format!("553 {path}: no such parent")));
        }

        let mut buf = Vec::new();
        data.read_to_end(&mut buf)?;
        state.bytes_stored += buf.len() as u64;
        state.files.insert(path.to_string(), buf);
        Ok(())
    }

    fn retrieve(&mut self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Retrieve(path.to_string()));

        let data = state.files.get(path).cloned().ok_or(RemoteError::NotFound)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Close);
        state.closed += 1;
        Ok(())
    }
}
