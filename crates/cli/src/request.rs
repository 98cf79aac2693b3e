//! JSON request read from stdin, and the results written to stdout

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use ftpsync_core::{Error, RemoteEndpoint, Result, VersionToken};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Full request envelope
#[derive(Deserialize)]
pub struct Request {
    source: Option<Source>,
    #[serde(default)]
    params: Option<Params>,
    /// Version being fetched (`in` only)
    #[serde(default)]
    pub version: Option<VersionRef>,
}

/// Where the server is and which file is tracked
#[derive(Deserialize)]
struct Source {
    #[serde(default, alias = "host")]
    address: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    tls: bool,
}

/// Per-step parameters
#[derive(Debug, Default, Deserialize)]
struct Params {
    #[serde(default)]
    path: String,
    local: Option<String>,
    remote: Option<String>,
}

/// What `out` should push
#[derive(Debug, PartialEq, Eq)]
pub enum OutTarget {
    /// Sync the directory `local` (relative to the base dir) onto `remote`
    Tree { local: PathBuf, remote: String },
    /// Upload the file at `path` (relative to the base dir) as the tracked file
    File { path: PathBuf, filename: String },
}

impl Request {
    /// Decode a request from JSON
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the input is not a valid request
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader)
            .map_err(|e| Error::Config(format!("error decoding input: {e}")))
    }

    fn source(&self) -> Result<&Source> {
        self.source
            .as_ref()
            .ok_or_else(|| Error::Config("source not specified".to_string()))
    }

    /// Connection settings
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the source or any credential is missing
    pub fn endpoint(&self) -> Result<RemoteEndpoint> {
        let source = self.source()?;
        RemoteEndpoint::new(
            source.address.as_str(),
            source.username.as_str(),
            source.password.as_str(),
            source.tls,
        )
    }

    /// Remote path of the tracked file
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `filename` is empty
    pub fn tracked_file(&self) -> Result<&str> {
        let filename = self.source()?.filename.as_str();
        if filename.is_empty() {
            return Err(Error::Config(
                "'filename' field in the source cannot be empty".to_string(),
            ));
        }
        Ok(filename)
    }

    /// Local path of the tracked file, relative to the base directory.
    ///
    /// Falls back to the file name of the tracked file when `params.path` is empty.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the path is absolute or leaves the base directory
    pub fn local_file(&self) -> Result<PathBuf> {
        let path = match self.params.as_ref().map(|p| p.path.as_str()) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => {
                let filename = self.tracked_file()?;
                warn!("Empty path in params, using {filename:?}");
                let name = Path::new(filename).file_name().ok_or_else(|| {
                    Error::Config(format!("cannot derive a local path from {filename:?}"))
                })?;
                PathBuf::from(name)
            }
        };
        ensure_relative(&path)?;
        Ok(path)
    }

    /// Decide between a directory sync and a tracked-file upload
    ///
    /// # Errors
    /// Returns [`Error::Config`] if only one of `local`/`remote` is given, or
    /// neither is and there is no tracked file
    pub fn out_target(&self) -> Result<OutTarget> {
        let params = self.params.as_ref();
        let local = params.and_then(|p| p.local.as_deref()).filter(|s| !s.is_empty());
        let remote = params.and_then(|p| p.remote.as_deref()).filter(|s| !s.is_empty());

        match (local, remote) {
            (Some(local), Some(remote)) => Ok(OutTarget::Tree {
                local: PathBuf::from(local),
                remote: remote.to_string(),
            }),
            (None, None) => Ok(OutTarget::File {
                path: self.local_file()?,
                filename: self.tracked_file()?.to_string(),
            }),
            (Some(_), None) => Err(Error::Config(
                "'remote' is required when 'local' is set".to_string(),
            )),
            (None, Some(_)) => Err(Error::Config(
                "'local' is required when 'remote' is set".to_string(),
            )),
        }
    }
}

fn ensure_relative(path: &Path) -> Result<()> {
    if path.has_root() || path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::Config(format!(
            "path {} must stay inside the base directory",
            path.display()
        )));
    }
    Ok(())
}

/// `{"ref": "<hex>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl From<VersionToken> for VersionRef {
    fn from(token: VersionToken) -> Self {
        Self {
            reference: token.to_string(),
        }
    }
}

/// One `{"name", "value"}` metadata pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

/// Result of `in` and of a tracked-file `out`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionOutput {
    pub version: VersionRef,
    pub metadata: Vec<MetadataField>,
}

impl VersionOutput {
    #[must_use]
    pub fn new(token: VersionToken) -> Self {
        Self {
            version: token.into(),
            metadata: Vec::new(),
        }
    }
}

/// Serializes as `{}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Empty {}

/// Result of `out`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutOutput {
    Version(VersionOutput),
    Synced(Empty),
}
