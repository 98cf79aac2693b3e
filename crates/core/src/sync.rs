//! One-way tree sync: bring a remote tree in line with a local one
//!
//! For every local entry (parents first) the uploader does the least it can:
//!
//! - the root itself is never touched; the remote root must already exist
//! - directories are created, and "already exists" counts as success
//! - files are uploaded unless the remote reports exactly the same size
//!
//! Size equality is the only change check. A file edited in place without
//! changing length is not re-uploaded; avoiding a full download per file is
//! worth that blind spot.
//!
//! A directory that cannot be created is skipped along with everything below
//! it, the walk carries on with its siblings, and the sync fails with
//! [`Error::Incomplete`] once the walk is done. A failed file upload aborts
//! immediately. Nothing is retried.

use std::fs::File;

use tracing::{debug, info, warn};

use crate::endpoint::SyncRequest;
use crate::error::{Error, RemoteError, Result};
use crate::session::Session;
use crate::tree::{EntryKind, TreeEntry, TreeWalker};

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOutcome {
    DirectoryCreated,
    DirectoryPresent,
    FileUploaded,
    FileSkipped,
    FileUploadFailed,
    DirectoryFailed,
}

impl SyncOutcome {
    /// Whether the remote side was modified
    #[must_use]
    pub fn is_change(self) -> bool {
        matches!(self, Self::DirectoryCreated | Self::FileUploaded)
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::FileUploadFailed | Self::DirectoryFailed)
    }
}

/// Receives per-entry progress from [`sync_tree`]
pub trait SyncObserver {
    /// Called right before a file transfer begins
    fn upload_started(&mut self, _entry: &TreeEntry) {}

    /// Called once per non-root entry with its final outcome
    fn entry_done(&mut self, entry: &TreeEntry, outcome: SyncOutcome);

    /// Called once the walk is over, also when the sync ends in
    /// [`Error::Incomplete`]. Not called when a file upload aborts the walk.
    fn finished(&mut self, _report: &SyncReport) {}
}

/// Observer that discards everything
impl SyncObserver for () {
    fn entry_done(&mut self, _entry: &TreeEntry, _outcome: SyncOutcome) {}
}

/// Ordered record of a completed sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// `(remote path, outcome)` in walk order
    pub entries: Vec<(String, SyncOutcome)>,
    pub bytes_uploaded: u64,
}

impl SyncReport {
    #[must_use]
    pub fn count(&self, outcome: SyncOutcome) -> usize {
        self.entries.iter().filter(|(_, o)| *o == outcome).count()
    }

    #[must_use]
    pub fn uploaded(&self) -> usize {
        self.count(SyncOutcome::FileUploaded)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(SyncOutcome::FileSkipped)
    }

    /// True when the remote tree was already up to date
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.entries.iter().any(|(_, o)| o.is_change())
    }

    /// Outcome recorded for a remote path
    #[must_use]
    pub fn outcome(&self, remote: &str) -> Option<SyncOutcome> {
        self.entries
            .iter()
            .find(|(path, _)| path == remote)
            .map(|(_, o)| *o)
    }
}

/// Sync the local tree of `request` onto the remote side of `session`.
///
/// # Errors
/// - [`Error::Walk`] if the local tree cannot be read
/// - [`Error::LocalIo`] / [`Error::Upload`] on the first failed file
/// - [`Error::Incomplete`] if any remote directory could not be created
pub fn sync_tree<S>(
    session: &mut S,
    request: &SyncRequest,
    observer: &mut dyn SyncObserver,
) -> Result<SyncReport>
where
    S: Session + ?Sized,
{
    info!(
        "Syncing {} -> {}",
        request.local_root().display(),
        request.remote_root()
    );

    let mut walker = TreeWalker::new(request.local_root(), request.remote_root());
    let mut report = SyncReport::default();
    let mut failed_dirs = Vec::new();

    while let Some(entry) = walker.next() {
        let entry = entry?;

        if entry.is_root() {
            debug!("Skipping root {}", entry.remote);
            continue;
        }

        let outcome = match entry.kind {
            EntryKind::Directory => {
                let outcome = create_dir(session, &entry);
                if outcome == SyncOutcome::DirectoryFailed {
                    walker.skip_subtree();
                    failed_dirs.push(entry.remote.clone());
                }
                outcome
            }
            EntryKind::File { len } => {
                if is_unchanged(session, &entry.remote, len) {
                    SyncOutcome::FileSkipped
                } else {
                    observer.upload_started(&entry);
                    match upload(session, &entry) {
                        Ok(()) => {
                            report.bytes_uploaded += len;
                            SyncOutcome::FileUploaded
                        }
                        Err(e) => {
                            observer.entry_done(&entry, SyncOutcome::FileUploadFailed);
                            return Err(e);
                        }
                    }
                }
            }
        };

        observer.entry_done(&entry, outcome);
        report.entries.push((entry.remote, outcome));
    }

    observer.finished(&report);

    if !failed_dirs.is_empty() {
        return Err(Error::Incomplete { paths: failed_dirs });
    }

    info!(
        "Sync done: {} uploaded, {} unchanged",
        report.uploaded(),
        report.skipped()
    );
    Ok(report)
}

fn create_dir<S: Session + ?Sized>(session: &mut S, entry: &TreeEntry) -> SyncOutcome {
    match session.make_dir(&entry.remote) {
        Ok(()) => {
            debug!("Created {}", entry.remote);
            SyncOutcome::DirectoryCreated
        }
        Err(RemoteError::AlreadyExists) => {
            debug!("{} already exists", entry.remote);
            SyncOutcome::DirectoryPresent
        }
        Err(e) => {
            warn!("Cannot create {}, skipping its contents: {e}", entry.remote);
            SyncOutcome::DirectoryFailed
        }
    }
}

/// Remote size equals local length. A failed size query counts as changed.
fn is_unchanged<S: Session + ?Sized>(session: &mut S, remote: &str, len: u64) -> bool {
    match session.file_size(remote) {
        Ok(size) if size == len => true,
        Ok(size) => {
            debug!("{remote}: remote size {size} != local size {len}");
            false
        }
        Err(RemoteError::NotFound) => false,
        Err(e) => {
            debug!("{remote}: size query failed ({e}), uploading");
            false
        }
    }
}

fn upload<S: Session + ?Sized>(session: &mut S, entry: &TreeEntry) -> Result<()> {
    let mut file = File::open(&entry.local).map_err(|e| Error::local_io(&entry.local, e))?;

    session
        .store(&entry.remote, &mut file)
        .map_err(|source| Error::Upload {
            local: entry.local.clone(),
            remote: entry.remote.clone(),
            source,
        })?;

    debug!("Uploaded {}", entry.remote);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConnector, Op};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Observer recording the order of callbacks
    #[derive(Default)]
    struct Recorder {
        events: Vec<(String, SyncOutcome)>,
        started: Vec<String>,
        summary: Option<SyncReport>,
    }

    impl SyncObserver for Recorder {
        fn upload_started(&mut self, entry: &TreeEntry) {
            self.started.push(entry.remote.clone());
        }

        fn entry_done(&mut self, entry: &TreeEntry, outcome: SyncOutcome) {
            self.events.push((entry.remote.clone(), outcome));
        }

        fn finished(&mut self, report: &SyncReport) {
            self.summary = Some(report.clone());
        }
    }

    /// base/site/a/x.txt (5 bytes), base/site/a/b/y.txt (3 bytes)
    fn scenario_tree() -> (TempDir, SyncRequest) {
        let dir = TempDir::new().unwrap();
        let site = dir.path().join("site");
        fs::create_dir_all(site.join("a/b")).unwrap();
        fs::write(site.join("a/x.txt"), "hello").unwrap();
        fs::write(site.join("a/b/y.txt"), "abc").unwrap();

        let request = SyncRequest::resolve(dir.path(), Path::new("site"), "/r").unwrap();
        (dir, request)
    }

    #[test]
    fn test_sync_into_empty_remote() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new().with_dir("/r");
        let mut session = connector.session();

        let report = sync_tree(&mut session, &request, &mut ()).unwrap();

        assert_eq!(
            report.entries,
            vec![
                ("/r/a".to_string(), SyncOutcome::DirectoryCreated),
                ("/r/a/b".to_string(), SyncOutcome::DirectoryCreated),
                ("/r/a/b/y.txt".to_string(), SyncOutcome::FileUploaded),
                ("/r/a/x.txt".to_string(), SyncOutcome::FileUploaded),
            ]
        );
        assert_eq!(report.bytes_uploaded, 8);

        let state = connector.state();
        assert_eq!(state.made_dirs(), ["/r/a", "/r/a/b"]);
        assert_eq!(state.files["/r/a/x.txt"], b"hello");
        assert_eq!(state.files["/r/a/b/y.txt"], b"abc");
    }

    #[test]
    fn test_second_run_is_noop() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new().with_dir("/r");

        sync_tree(&mut connector.session(), &request, &mut ()).unwrap();
        connector.clear_ops();

        let report = sync_tree(&mut connector.session(), &request, &mut ()).unwrap();

        assert!(report.is_noop());
        assert_eq!(report.count(SyncOutcome::DirectoryPresent), 2);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.bytes_uploaded, 0);

        let state = connector.state();
        assert!(state.stored().is_empty());
        assert_eq!(state.bytes_stored, 0);
    }

    #[test]
    fn test_root_entry_never_touched() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new().with_dir("/r");

        sync_tree(&mut connector.session(), &request, &mut ()).unwrap();

        let state = connector.state();
        assert!(!state.ops.contains(&Op::MakeDir("/r".to_string())));
        assert!(!state.ops.contains(&Op::FileSize("/r".to_string())));
    }

    #[test]
    fn test_directory_created_before_descendants() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new().with_dir("/r");
        let mut recorder = Recorder::default();

        sync_tree(&mut connector.session(), &request, &mut recorder).unwrap();

        let position = |path: &str| {
            recorder
                .events
                .iter()
                .position(|(p, _)| p == path)
                .unwrap()
        };
        assert!(position("/r/a") < position("/r/a/x.txt"));
        assert!(position("/r/a") < position("/r/a/b"));
        assert!(position("/r/a/b") < position("/r/a/b/y.txt"));
        assert_eq!(recorder.started, ["/r/a/b/y.txt", "/r/a/x.txt"]);
    }

    #[test]
    fn test_same_size_different_content_is_skipped() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new()
            .with_dir("/r")
            .with_dir("/r/a")
            .with_file("/r/a/x.txt", b"HELLO");

        let report = sync_tree(&mut connector.session(), &request, &mut ()).unwrap();

        assert_eq!(report.outcome("/r/a/x.txt"), Some(SyncOutcome::FileSkipped));
        assert_eq!(connector.state().files["/r/a/x.txt"], b"HELLO");
    }

    #[test]
    fn test_size_mismatch_overwrites() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new()
            .with_dir("/r")
            .with_dir("/r/a")
            .with_file("/r/a/x.txt", b"stale content");

        let report = sync_tree(&mut connector.session(), &request, &mut ()).unwrap();

        assert_eq!(report.outcome("/r/a/x.txt"), Some(SyncOutcome::FileUploaded));
        assert_eq!(connector.state().files["/r/a/x.txt"], b"hello");
    }

    #[test]
    fn test_size_query_error_uploads() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new()
            .with_dir("/r")
            .with_file("/r/a/x.txt", b"hello")
            .fail_size("/r/a/x.txt");

        let report = sync_tree(&mut connector.session(), &request, &mut ()).unwrap();
        assert_eq!(report.outcome("/r/a/x.txt"), Some(SyncOutcome::FileUploaded));
    }

    #[test]
    fn test_failed_directory_skips_subtree_but_not_siblings() {
        let dir = TempDir::new().unwrap();
        let site = dir.path().join("site");
        fs::create_dir_all(site.join("a/b")).unwrap();
        fs::create_dir_all(site.join("c")).unwrap();
        fs::write(site.join("a/b/y.txt"), "abc").unwrap();
        fs::write(site.join("a/x.txt"), "hello").unwrap();
        fs::write(site.join("c/z.txt"), "zz").unwrap();
        let request = SyncRequest::resolve(dir.path(), Path::new("site"), "/r").unwrap();

        let connector = MemoryConnector::new().with_dir("/r").fail_make_dir("/r/a");
        let mut recorder = Recorder::default();

        let err = sync_tree(&mut connector.session(), &request, &mut recorder).unwrap_err();

        match err {
            Error::Incomplete { paths } => assert_eq!(paths, ["/r/a"]),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(
            recorder.events,
            vec![
                ("/r/a".to_string(), SyncOutcome::DirectoryFailed),
                ("/r/c".to_string(), SyncOutcome::DirectoryCreated),
                ("/r/c/z.txt".to_string(), SyncOutcome::FileUploaded),
            ]
        );
        let state = connector.state();
        assert_eq!(state.stored(), ["/r/c/z.txt"]);
        assert!(!state.ops.iter().any(|op| matches!(op, Op::MakeDir(p) if p == "/r/a/b")));

        // the siblings that did sync are still summarized
        let summary = recorder.summary.expect("summary reported");
        assert_eq!(summary.uploaded(), 1);
        assert_eq!(summary.bytes_uploaded, 2);
        assert_eq!(summary.outcome("/r/a"), Some(SyncOutcome::DirectoryFailed));
    }

    #[test]
    fn test_upload_failure_aborts_walk() {
        let (_dir, request) = scenario_tree();
        let connector = MemoryConnector::new()
            .with_dir("/r")
            .fail_store("/r/a/b/y.txt");
        let mut recorder = Recorder::default();

        let err = sync_tree(&mut connector.session(), &request, &mut recorder).unwrap_err();

        assert!(matches!(err, Error::Upload { ref remote, .. } if remote == "/r/a/b/y.txt"));
        assert_eq!(
            recorder.events.last(),
            Some(&("/r/a/b/y.txt".to_string(), SyncOutcome::FileUploadFailed))
        );
        // x.txt comes after y.txt in walk order and must not be attempted
        assert!(!connector.state().stored().contains(&"/r/a/x.txt"));
        assert!(recorder.summary.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_local_file_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, request) = scenario_tree();
        let secret = dir.path().join("site/a/x.txt");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
        if File::open(&secret).is_ok() {
            // running as root: permissions are not enforced
            return;
        }

        let connector = MemoryConnector::new().with_dir("/r");
        let err = sync_tree(&mut connector.session(), &request, &mut ()).unwrap_err();
        assert!(matches!(err, Error::LocalIo { .. }));
    }
}
