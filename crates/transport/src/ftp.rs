//! FTP session façade built on `suppaftp`
//!
//! Reply classification happens here so the engine only ever sees
//! [`RemoteError`] variants.

use std::io::Read;

use ftpsync_core::{ConnectError, Connector, RemoteEndpoint, RemoteError, Result, Session};
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, NativeTlsConnector, NativeTlsFtpStream, Status};
use tracing::{debug, info, warn};

/// Control connection, plain or upgraded with explicit TLS
enum Stream {
    Plain(FtpStream),
    Secure(NativeTlsFtpStream),
}

/// Run `$body` against whichever stream variant is live
macro_rules! with_stream {
    ($stream:expr, |$s:ident| $body:expr) => {
        match $stream {
            Stream::Plain($s) => $body,
            Stream::Secure($s) => $body,
        }
    };
}

/// Opens [`FtpSession`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

impl FtpConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connector for FtpConnector {
    type Session = FtpSession;

    fn open(&self, endpoint: &RemoteEndpoint) -> Result<FtpSession> {
        FtpSession::connect(endpoint)
    }
}

/// An authenticated FTP control connection
pub struct FtpSession {
    stream: Stream,
    closed: bool,
}

impl FtpSession {
    /// Dial, optionally secure the channel, log in, and switch to binary mode
    ///
    /// # Errors
    /// Returns [`ConnectError`] (wrapped) if any step fails
    pub fn connect(endpoint: &RemoteEndpoint) -> Result<Self> {
        info!("Connecting to {}...", endpoint.address);
        let mut stream = dial(endpoint)?;

        with_stream!(&mut stream, |s| s.login(&endpoint.username, &endpoint.password)).map_err(
            |e| ConnectError::Login {
                username: endpoint.username.clone(),
                reason: e.to_string(),
            },
        )?;

        with_stream!(&mut stream, |s| s.transfer_type(FileType::Binary)).map_err(|e| {
            ConnectError::Login {
                username: endpoint.username.clone(),
                reason: format!("cannot switch to binary mode: {e}"),
            }
        })?;

        debug!("Logged in as {}", endpoint.username);
        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Whether `path` is an existing directory, checked by changing into it
    fn is_dir(&mut self, path: &str) -> bool {
        let Ok(cwd) = with_stream!(&mut self.stream, |s| s.pwd()) else {
            return false;
        };
        if with_stream!(&mut self.stream, |s| s.cwd(path)).is_err() {
            return false;
        }
        // Absolute remote paths keep working even if this fails.
        if let Err(e) = with_stream!(&mut self.stream, |s| s.cwd(&cwd)) {
            warn!("Cannot return to {cwd} after checking {path}: {e}");
        }
        true
    }
}

fn dial(endpoint: &RemoteEndpoint) -> Result<Stream, ConnectError> {
    let dial_error = |e: FtpError| ConnectError::Dial {
        address: endpoint.address.clone(),
        reason: e.to_string(),
    };

    if !endpoint.secure {
        let stream = FtpStream::connect(endpoint.address.as_str()).map_err(dial_error)?;
        return Ok(Stream::Plain(stream));
    }

    let secure_error = |reason: String| ConnectError::Secure {
        address: endpoint.address.clone(),
        reason,
    };
    let tls = TlsConnector::new().map_err(|e| secure_error(e.to_string()))?;
    let stream = NativeTlsFtpStream::connect(endpoint.address.as_str()).map_err(dial_error)?;
    let stream = stream
        .into_secure(NativeTlsConnector::from(tls), endpoint.host())
        .map_err(|e| secure_error(e.to_string()))?;

    debug!("Control channel secured");
    Ok(Stream::Secure(stream))
}

/// Reply text if the server answered 550 (file unavailable)
fn unavailable(err: &FtpError) -> Option<String> {
    match err {
        FtpError::UnexpectedResponse(response)
            if matches!(response.status, Status::FileUnavailable) =>
        {
            Some(String::from_utf8_lossy(&response.body).into_owned())
        }
        _ => None,
    }
}

/// Classify a failed `MKD` from the reply alone.
///
/// Servers disagree on how to say "exists": some put it in the 550 text,
/// others only say the operation failed. `None` means a 550 that needs a
/// `CWD` check to tell.
fn classify_mkdir(err: &FtpError) -> Option<RemoteError> {
    match unavailable(err) {
        Some(text) if text.to_lowercase().contains("exist") => Some(RemoteError::AlreadyExists),
        Some(_) => None,
        None => Some(RemoteError::other(err)),
    }
}

fn not_found_or_other(err: FtpError) -> RemoteError {
    if unavailable(&err).is_some() {
        RemoteError::NotFound
    } else {
        RemoteError::other(err)
    }
}

impl Session for FtpSession {
    fn make_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        let Err(err) = with_stream!(&mut self.stream, |s| s.mkdir(path)) else {
            return Ok(());
        };

        match classify_mkdir(&err) {
            Some(classified) => Err(classified),
            None if self.is_dir(path) => Err(RemoteError::AlreadyExists),
            None => Err(RemoteError::other(err)),
        }
    }

    fn file_size(&mut self, path: &str) -> Result<u64, RemoteError> {
        let size = with_stream!(&mut self.stream, |s| s.size(path)).map_err(not_found_or_other)?;
        Ok(size as u64)
    }

    fn store(&mut self, path: &str, mut data: &mut dyn Read) -> Result<(), RemoteError> {
        let written = with_stream!(&mut self.stream, |s| s.put_file(path, &mut data))
            .map_err(RemoteError::other)?;
        debug!("STOR {path}: {written} bytes");
        Ok(())
    }

    fn retrieve(&mut self, path: &str) -> Result<Box<dyn Read + '_>, RemoteError> {
        let buffer =
            with_stream!(&mut self.stream, |s| s.retr_as_buffer(path)).map_err(not_found_or_other)?;
        Ok(Box::new(buffer))
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        with_stream!(&mut self.stream, |s| s.quit()).map_err(RemoteError::other)
    }
}
