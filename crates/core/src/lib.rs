//! ftpsync-core: sync and versioning engine
//!
//! Provides content fingerprinting, the session façade traits, and the
//! one-way tree differ/uploader.

pub mod endpoint;
pub mod error;
pub mod hash;
pub mod memory;
pub mod session;
pub mod sync;
pub mod tree;
pub mod version;

pub use endpoint::{RemoteEndpoint, SyncRequest};
pub use error::{ConnectError, Error, RemoteError, Result};
pub use hash::{ContentHash, Fingerprinter, VersionToken};
pub use session::{Connector, Session, with_session};
pub use sync::{SyncObserver, SyncOutcome, SyncReport, sync_tree};
pub use tree::{EntryKind, TreeEntry};
