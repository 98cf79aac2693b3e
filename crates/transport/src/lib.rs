//! ftpsync-transport: session façades
//!
//! [`FtpConnector`] talks to a real FTP server; [`LocalConnector`] treats a
//! local directory as the remote tree.

pub mod ftp;
pub mod local;

pub use ftp::{FtpConnector, FtpSession};
pub use local::{LocalConnector, LocalSession};
