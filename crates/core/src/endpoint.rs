//! Immutable descriptions of where to connect and what to sync

use std::fmt;
use std::net::Ipv6Addr;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Default FTP control port, appended when the address has none
pub const DEFAULT_PORT: u16 = 21;

/// How to reach and authenticate to the remote store
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// `host:port`
    pub address: String,
    pub username: String,
    pub password: String,
    /// Upgrade the control channel with explicit TLS before logging in
    pub secure: bool,
}

impl RemoteEndpoint {
    /// Build an endpoint, rejecting empty fields
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the address is malformed or a field is empty
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        secure: bool,
    ) -> Result<Self> {
        let address = address.into();
        let username = username.into();
        let password = password.into();

        let address = address.trim();
        if address.is_empty() {
            return Err(Error::config("'address' field in the source cannot be empty"));
        }
        if username.is_empty() {
            return Err(Error::config("'username' field in the source cannot be empty"));
        }
        if password.is_empty() {
            return Err(Error::config("'password' field in the source cannot be empty"));
        }

        Ok(Self {
            address: with_default_port(address)?,
            username,
            password,
            secure,
        })
    }

    /// Host part of the address, used as the TLS server name
    #[must_use]
    pub fn host(&self) -> &str {
        self.address
            .rsplit_once(':')
            .map_or(self.address.as_str(), |(host, _)| host)
            .trim_start_matches('[')
            .trim_end_matches(']')
    }
}

// Keep the password out of logs.
impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .finish()
    }
}

/// Normalize to `host:port`, adding [`DEFAULT_PORT`] when none is given.
/// Bare IPv6 literals are bracketed.
fn with_default_port(address: &str) -> Result<String> {
    let invalid = || Error::config(format!("invalid address {address:?}"));

    // bracketed IPv6 literal: [::1] or [::1]:21
    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        if host.parse::<Ipv6Addr>().is_err() {
            return Err(invalid());
        }
        return match tail {
            "" => Ok(format!("[{host}]:{DEFAULT_PORT}")),
            _ => match tail.strip_prefix(':').map(str::parse::<u16>) {
                Some(Ok(_)) => Ok(address.to_string()),
                _ => Err(invalid()),
            },
        };
    }

    if address.parse::<Ipv6Addr>().is_ok() {
        return Ok(format!("[{address}]:{DEFAULT_PORT}"));
    }

    match address.split_once(':') {
        None => Ok(format!("{address}:{DEFAULT_PORT}")),
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(address.to_string())
        }
        Some(_) => Err(invalid()),
    }
}

/// A validated directory sync: local tree onto a remote tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Canonical absolute path of the local root
    local_root: PathBuf,
    /// Absolute remote path, no trailing slash (except for `/` itself)
    remote_root: String,
}

impl SyncRequest {
    /// Resolve `local` against `base` and validate both roots.
    ///
    /// Everything is checked locally so a malformed request never touches the
    /// remote side.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `local` is absolute, escapes `base`, or is
    /// not an existing directory, or if `remote` is not absolute
    pub fn resolve(base: &Path, local: &Path, remote: &str) -> Result<Self> {
        if local.is_absolute() || local.has_root() {
            return Err(Error::config(format!(
                "local path {} must be relative to the base directory",
                local.display()
            )));
        }
        if local.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Error::config(format!(
                "local path {} must not contain '..'",
                local.display()
            )));
        }
        if !remote.starts_with('/') {
            return Err(Error::config(format!(
                "remote path {remote:?} must be absolute"
            )));
        }

        let base = base
            .canonicalize()
            .map_err(|e| Error::local_io(base, e))?;
        let joined = base.join(local);
        let local_root = joined
            .canonicalize()
            .map_err(|e| Error::local_io(&joined, e))?;

        // A symlink inside base could still point elsewhere.
        if !local_root.starts_with(&base) {
            return Err(Error::config(format!(
                "local path {} resolves outside the base directory",
                local.display()
            )));
        }
        if !local_root.is_dir() {
            return Err(Error::config(format!(
                "local path {} is not a directory",
                local.display()
            )));
        }

        Ok(Self {
            local_root,
            remote_root: normalize_remote(remote),
        })
    }

    #[must_use]
    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    #[must_use]
    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }
}

fn normalize_remote(remote: &str) -> String {
    let trimmed = remote.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Map a local path under `local_root` to its remote counterpart.
///
/// Returns `None` if `local` is not under `local_root`. The root itself maps
/// to `remote_root`.
#[must_use]
pub fn remote_path_for(local_root: &Path, remote_root: &str, local: &Path) -> Option<String> {
    let relative = local.strip_prefix(local_root).ok()?;

    let mut remote = normalize_remote(remote_root);
    for component in relative.components() {
        let Component::Normal(name) = component else {
            return None;
        };
        if !remote.ends_with('/') {
            remote.push('/');
        }
        remote.push_str(&name.to_string_lossy());
    }
    Some(remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_endpoint_default_port() {
        let ep = RemoteEndpoint::new("ftp.example.com", "user", "pw", false).unwrap();
        assert_eq!(ep.address, "ftp.example.com:21");
        assert_eq!(ep.host(), "ftp.example.com");

        let ep = RemoteEndpoint::new("ftp.example.com:2121", "user", "pw", true).unwrap();
        assert_eq!(ep.address, "ftp.example.com:2121");

        let ep = RemoteEndpoint::new("[::1]", "user", "pw", false).unwrap();
        assert_eq!(ep.address, "[::1]:21");
        assert_eq!(ep.host(), "::1");
    }

    #[test]
    fn test_endpoint_bare_ipv6_is_bracketed() {
        let ep = RemoteEndpoint::new("::1", "user", "pw", false).unwrap();
        assert_eq!(ep.address, "[::1]:21");
        assert_eq!(ep.host(), "::1");

        let ep = RemoteEndpoint::new("[fe80::1]:2121", "user", "pw", false).unwrap();
        assert_eq!(ep.address, "[fe80::1]:2121");
    }

    #[test]
    fn test_endpoint_rejects_malformed_address() {
        for address in ["host:", ":21", "host:ftp", "host:99999", "[::1", "[::1]:", "[nope]:21"] {
            assert!(
                matches!(
                    RemoteEndpoint::new(address, "user", "pw", false),
                    Err(Error::Config(_))
                ),
                "{address}"
            );
        }
    }

    #[test]
    fn test_endpoint_rejects_empty_fields() {
        assert!(matches!(
            RemoteEndpoint::new("", "user", "pw", false),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RemoteEndpoint::new("host", "", "pw", false),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RemoteEndpoint::new("host", "user", "", false),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_debug_redacts_password() {
        let ep = RemoteEndpoint::new("host", "user", "hunter2", false).unwrap();
        let debug = format!("{ep:?}");
        assert!(!debug.contains("hunter2"), "{debug}");
    }

    #[test]
    fn test_remote_path_mapping() {
        let root = Path::new("/base/dir");
        assert_eq!(
            remote_path_for(root, "/remote", Path::new("/base/dir/sub/f.txt")).as_deref(),
            Some("/remote/sub/f.txt")
        );
        assert_eq!(
            remote_path_for(root, "/remote/", Path::new("/base/dir")).as_deref(),
            Some("/remote")
        );
        assert_eq!(
            remote_path_for(root, "/", Path::new("/base/dir/a")).as_deref(),
            Some("/a")
        );
        assert_eq!(remote_path_for(root, "/remote", Path::new("/base/other")), None);
    }

    #[test]
    fn test_sync_request_resolves_under_base() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("out/site")).unwrap();

        let req = SyncRequest::resolve(dir.path(), Path::new("out/site"), "/www/").unwrap();
        assert!(req.local_root().ends_with("out/site"));
        assert_eq!(req.remote_root(), "/www");
    }

    #[test]
    fn test_sync_request_validation() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("site")).unwrap();
        fs::write(dir.path().join("file.txt"), "x").unwrap();

        let absolute = dir.path().join("site");
        assert!(matches!(
            SyncRequest::resolve(dir.path(), &absolute, "/www"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SyncRequest::resolve(dir.path(), Path::new("site/../.."), "/www"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SyncRequest::resolve(dir.path(), Path::new("site"), "www"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SyncRequest::resolve(dir.path(), Path::new("file.txt"), "/www"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SyncRequest::resolve(dir.path(), Path::new("missing"), "/www"),
            Err(Error::LocalIo { .. })
        ));
    }
}
