//! Local tree walking
//!
//! Entries come out depth-first with every directory before its children,
//! siblings sorted by file name. Symbolic links are never followed.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::endpoint::remote_path_for;
use crate::error::{Error, Result};

/// What a [`TreeEntry`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File { len: u64 },
}

/// One node of the local tree, with its computed remote path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute local path
    pub local: PathBuf,
    /// Remote path: the local root prefix replaced by the remote root
    pub remote: String,
    pub kind: EntryKind,
    /// Depth below the local root (the root itself is 0)
    pub depth: usize,
}

impl TreeEntry {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// Lazy walk over a local tree that can prune subtrees as it goes
pub struct TreeWalker {
    local_root: PathBuf,
    remote_root: String,
    inner: walkdir::IntoIter,
}

impl TreeWalker {
    #[must_use]
    pub fn new(local_root: &Path, remote_root: &str) -> Self {
        let inner = WalkDir::new(local_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Self {
            local_root: local_root.to_path_buf(),
            remote_root: remote_root.to_string(),
            inner,
        }
    }

    /// Do not descend into the directory most recently yielded
    pub fn skip_subtree(&mut self) {
        self.inner.skip_current_dir();
    }
}

impl Iterator for TreeWalker {
    type Item = Result<TreeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(Error::Walk(e))),
            };

            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                match entry.metadata() {
                    Ok(metadata) => EntryKind::File {
                        len: metadata.len(),
                    },
                    Err(e) => return Some(Err(Error::Walk(e))),
                }
            } else {
                warn!("Skipping {} (not a regular file or directory)", entry.path().display());
                continue;
            };

            // Walkdir only yields paths under the root it was given.
            let Some(remote) = remote_path_for(&self.local_root, &self.remote_root, entry.path())
            else {
                warn!("Skipping {} (outside the local root)", entry.path().display());
                continue;
            };

            return Some(Ok(TreeEntry {
                local: entry.path().to_path_buf(),
                remote,
                kind,
                depth: entry.depth(),
            }));
        }
    }
}
