//! The three verbs: check, in, out
//!
//! Each one validates everything it can before dialing, then runs inside a
//! single session that is closed on every exit path.

use std::path::Path;

use ftpsync_core::version::{current_version, fetch_to_file, push_file};
use ftpsync_core::{
    Connector, Result, SyncObserver, SyncRequest, VersionToken, sync_tree, with_session,
};
use tracing::{info, warn};

use crate::request::{Empty, OutOutput, OutTarget, Request, VersionOutput, VersionRef};

/// Current version of the tracked file: zero or one refs
///
/// # Errors
/// Returns an error on invalid config, connect failure, or a read error
pub fn check<C: Connector + ?Sized>(connector: &C, request: &Request) -> Result<Vec<VersionRef>> {
    let endpoint = request.endpoint()?;
    let filename = request.tracked_file()?;

    let token = with_session(connector, &endpoint, |session| {
        current_version(session, filename)
    })?;

    Ok(match token {
        VersionToken::Empty => Vec::new(),
        token => vec![token.into()],
    })
}

/// Download the tracked file into `base`
///
/// # Errors
/// Returns an error on invalid config, connect failure, a missing remote
/// file, or a local write error
pub fn fetch<C: Connector + ?Sized>(
    connector: &C,
    request: &Request,
    base: &Path,
) -> Result<VersionOutput> {
    let endpoint = request.endpoint()?;
    let filename = request.tracked_file()?;
    let dest = base.join(request.local_file()?);

    info!("Fetching {filename} to {}", dest.display());
    let token = with_session(connector, &endpoint, |session| {
        fetch_to_file(session, filename, &dest)
    })?;

    if let Some(requested) = &request.version {
        if requested.reference != token.to_string() {
            warn!(
                "{filename} changed since version {} was detected; fetched {token}",
                requested.reference
            );
        }
    }

    Ok(VersionOutput::new(token))
}

/// Push a directory tree or the tracked file from `base`
///
/// # Errors
/// Returns an error on invalid config, connect failure, or a failed sync
pub fn push<C: Connector + ?Sized>(
    connector: &C,
    request: &Request,
    base: &Path,
    observer: &mut dyn SyncObserver,
) -> Result<OutOutput> {
    let endpoint = request.endpoint()?;

    match request.out_target()? {
        OutTarget::Tree { local, remote } => {
            let sync = SyncRequest::resolve(base, &local, &remote)?;
            let report = with_session(connector, &endpoint, |session| {
                sync_tree(session, &sync, observer)
            })?;
            info!(
                "{} files uploaded, {} unchanged",
                report.uploaded(),
                report.skipped()
            );
            Ok(OutOutput::Synced(Empty {}))
        }
        OutTarget::File { path, filename } => {
            let local = base.join(path);
            let token = with_session(connector, &endpoint, |session| {
                push_file(session, &local, &filename)
            })?;
            Ok(OutOutput::Version(VersionOutput::new(token)))
        }
    }
}
